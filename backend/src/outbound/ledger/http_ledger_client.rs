//! Reqwest-backed ledger adapter.
//!
//! Owns transport details only: authentication headers, endpoint layout,
//! HTTP status mapping onto the port's transient/permanent error boundary,
//! and DTO decoding. Throttling (429) and server errors are transient;
//! validation rejections are permanent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::ports::{
    ContactFilter, ContactUpsert, LedgerApi, LedgerApiError, LedgerContact, LedgerInvoiceDraft,
    LedgerInvoiceState, LedgerInvoiceSummary,
};
use crate::domain::sync_engine::format_major;

use super::dto::{
    major_to_minor, ConnectionDto, ContactRenameDto, ContactUpsertDto, ContactsEnvelopeDto,
    InvoiceContactRefDto, InvoiceDraftDto, InvoiceLineItemDto, InvoicesEnvelopeDto,
    PaymentAccountRefDto, PaymentDraftDto, PaymentInvoiceRefDto, PaymentsEnvelopeDto,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TENANT_HEADER: &str = "Xero-Tenant-Id";

/// Connection settings for the ledger adapter.
#[derive(Debug, Clone)]
pub struct HttpLedgerClientConfig {
    /// Ledger API base URL.
    pub base_url: Url,
    /// OAuth bearer token for API calls.
    pub access_token: String,
    /// Tenant the calls are scoped to, once a connection exists.
    pub tenant_id: Option<String>,
    pub request_timeout: Duration,
}

impl HttpLedgerClientConfig {
    /// Create a configuration with the default timeout.
    pub fn new(base_url: Url, access_token: impl Into<String>) -> Self {
        Self {
            base_url,
            access_token: access_token.into(),
            tenant_id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Ledger adapter performing HTTP requests against a Xero-style API.
pub struct HttpLedgerClient {
    client: Client,
    config: HttpLedgerClientConfig,
}

impl HttpLedgerClient {
    /// Build an adapter with its own reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: HttpLedgerClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerApiError> {
        self.config
            .base_url
            .join(path)
            .map_err(|err| LedgerApiError::validation(format!("invalid endpoint: {err}")))
    }

    fn authorise(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .bearer_auth(&self.config.access_token)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.config.tenant_id {
            Some(tenant_id) => request.header(TENANT_HEADER, tenant_id),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, LedgerApiError> {
        let response = self
            .authorise(request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }
        serde_json::from_str(&body)
            .map_err(|err| LedgerApiError::validation(format!("decode response: {err}")))
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LedgerApiError> {
        let endpoint = self.endpoint(path)?;
        self.send_json(self.client.post(endpoint).json(body)).await
    }
}

fn map_transport_error(error: reqwest::Error) -> LedgerApiError {
    LedgerApiError::unavailable(error.to_string())
}

fn map_status_error(status: StatusCode, body: &str) -> LedgerApiError {
    let detail = if body.is_empty() { "<empty body>" } else { body };
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            LedgerApiError::rate_limited(format!("ledger returned {status}: {detail}"))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LedgerApiError::unavailable(format!("ledger returned {status}: {detail}"))
        }
        status if status.is_server_error() => {
            LedgerApiError::unavailable(format!("ledger returned {status}: {detail}"))
        }
        _ => LedgerApiError::validation(format!("ledger returned {status}: {detail}")),
    }
}

fn first_or_validation<T>(mut items: Vec<T>, what: &str) -> Result<T, LedgerApiError> {
    if items.is_empty() {
        return Err(LedgerApiError::validation(format!(
            "ledger response carries no {what}"
        )));
    }
    Ok(items.swap_remove(0))
}

#[async_trait]
impl LedgerApi for HttpLedgerClient {
    async fn has_live_connection(&self) -> Result<bool, LedgerApiError> {
        let endpoint = self.endpoint("connections")?;
        let response = self
            .authorise(self.client.get(endpoint))
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        // Expired or missing authorisation means "no connection", not an
        // error: the sync run should skip, not report a failure.
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(false);
        }
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }
        let connections: Vec<ConnectionDto> = serde_json::from_str(&body)
            .map_err(|err| LedgerApiError::validation(format!("decode connections: {err}")))?;
        Ok(!connections.is_empty())
    }

    async fn upsert_contact(
        &self,
        contact: &ContactUpsert,
    ) -> Result<LedgerContact, LedgerApiError> {
        let body = ContactUpsertDto {
            name: &contact.name,
            email_address: contact.email.as_deref(),
        };
        let envelope: ContactsEnvelopeDto = self.post_json("api.xro/2.0/Contacts", &body).await?;
        let dto = first_or_validation(envelope.contacts, "contact")?;
        if dto.is_archived() {
            return Err(LedgerApiError::archived_contact(dto.contact_id));
        }
        Ok(dto.into_port_contact())
    }

    async fn list_contacts(
        &self,
        filter: &ContactFilter,
    ) -> Result<Vec<LedgerContact>, LedgerApiError> {
        let clause = match filter {
            ContactFilter::Name(name) => format!("Name==\"{name}\""),
            ContactFilter::Email(email) => format!("EmailAddress==\"{email}\""),
        };
        let endpoint = self.endpoint("api.xro/2.0/Contacts")?;
        let request = self
            .client
            .get(endpoint)
            .query(&[("where", clause.as_str()), ("includeArchived", "true")]);
        let envelope: ContactsEnvelopeDto = self.send_json(request).await?;
        Ok(envelope
            .contacts
            .into_iter()
            .map(super::dto::ContactDto::into_port_contact)
            .collect())
    }

    async fn rename_contact(
        &self,
        contact_id: &str,
        new_name: &str,
    ) -> Result<(), LedgerApiError> {
        let body = ContactRenameDto { name: new_name };
        let _: ContactsEnvelopeDto = self
            .post_json(&format!("api.xro/2.0/Contacts/{contact_id}"), &body)
            .await?;
        Ok(())
    }

    async fn create_invoice(
        &self,
        draft: &LedgerInvoiceDraft,
    ) -> Result<LedgerInvoiceSummary, LedgerApiError> {
        let body = InvoiceDraftDto {
            invoice_type: "ACCREC",
            reference: draft.reference.to_string(),
            contact: InvoiceContactRefDto {
                contact_id: &draft.contact_id,
            },
            line_items: draft
                .line_items
                .iter()
                .map(|item| InvoiceLineItemDto {
                    description: &item.description,
                    quantity: item.quantity,
                    unit_amount: &item.unit_amount,
                })
                .collect(),
            status: &draft.status,
        };
        let envelope: InvoicesEnvelopeDto = self.post_json("api.xro/2.0/Invoices", &body).await?;
        let dto = first_or_validation(envelope.invoices, "invoice")?;
        Ok(LedgerInvoiceSummary {
            external_id: dto.invoice_id,
            number: dto.invoice_number.unwrap_or_default(),
        })
    }

    async fn get_invoice(&self, external_id: &str) -> Result<LedgerInvoiceState, LedgerApiError> {
        let endpoint = self.endpoint(&format!("api.xro/2.0/Invoices/{external_id}"))?;
        let envelope: InvoicesEnvelopeDto = self.send_json(self.client.get(endpoint)).await?;
        let dto = first_or_validation(envelope.invoices, "invoice")?;
        Ok(LedgerInvoiceState {
            status: dto.status.unwrap_or_default(),
            amount_due_minor: major_to_minor(dto.amount_due.unwrap_or(0.0)),
        })
    }

    async fn create_payment(
        &self,
        invoice_external_id: &str,
        bank_account_code: &str,
        amount_minor: i64,
    ) -> Result<String, LedgerApiError> {
        let body = PaymentDraftDto {
            invoice: PaymentInvoiceRefDto {
                invoice_id: invoice_external_id,
            },
            account: PaymentAccountRefDto {
                code: bank_account_code,
            },
            amount: format_major(amount_minor),
        };
        let envelope: PaymentsEnvelopeDto = self.post_json("api.xro/2.0/Payments", &body).await?;
        let dto = first_or_validation(envelope.payments, "payment")?;
        Ok(dto.payment_id)
    }
}
