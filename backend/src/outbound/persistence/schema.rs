//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. Diesel uses
//! them for compile-time query validation and type-safe SQL generation.

diesel::table! {
    /// Purchasable registration categories, optionally capacity-limited.
    registration_categories (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Human-readable category name.
        name -> Varchar,
        /// Maximum concurrent paid-or-held slots; NULL means unlimited.
        max_capacity -> Nullable<Int4>,
        /// Price in minor currency units.
        price_minor -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Capacity holds and their payment lifecycle.
    ///
    /// A partial unique index on `(user_id, category_id)` over non-terminal
    /// statuses enforces one live row per user per category.
    reservations (id) {
        id -> Uuid,
        user_id -> Uuid,
        category_id -> Uuid,
        /// Lifecycle status: awaiting_payment, processing, paid, failed, refunded.
        status -> Varchar,
        /// Gateway charge linked once confirmation starts.
        charge_id -> Nullable<Varchar>,
        /// Passive hold expiry; expired rows stop counting against capacity.
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Invoice half of a ledger staging record.
    staging_invoices (id) {
        /// Primary key, embedded in gateway charge metadata as the linkage key.
        id -> Uuid,
        user_id -> Uuid,
        registration_id -> Nullable<Uuid>,
        total_minor -> Int8,
        discount_minor -> Int8,
        net_minor -> Int8,
        /// Ledger-side status vocabulary: DRAFT or AUTHORISED.
        invoice_status -> Varchar,
        /// Sync lifecycle: staged, pending, synced, failed, needs_update.
        sync_status -> Varchar,
        /// Charge id, contact details, and payment-plan flags.
        metadata -> Jsonb,
        /// Linked payment shell, set at completion.
        payment_id -> Nullable<Uuid>,
        external_invoice_id -> Nullable<Varchar>,
        external_invoice_number -> Nullable<Varchar>,
        sync_error -> Nullable<Text>,
        /// Claim stamp excluding the row from concurrent sync passes.
        claimed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Invoice lines; discount lines carry negative amounts.
    staging_line_items (id) {
        id -> Uuid,
        invoice_id -> Uuid,
        description -> Text,
        amount_minor -> Int8,
        quantity -> Int4,
    }
}

diesel::table! {
    /// Payment shell linked to a staging invoice.
    staging_payments (id) {
        id -> Uuid,
        invoice_id -> Uuid,
        user_id -> Uuid,
        amount_minor -> Int8,
        /// Settlement status: staged or completed.
        status -> Varchar,
        /// Sync lifecycle: staged, pending, synced, failed, needs_update.
        sync_status -> Varchar,
        /// Gateway charge reference attached at completion.
        charge_ref -> Nullable<Varchar>,
        bank_account_ref -> Nullable<Varchar>,
        external_payment_id -> Nullable<Varchar>,
        sync_error -> Nullable<Text>,
        /// Claim stamp excluding the row from concurrent sync passes.
        claimed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Discount usage accounting, unique per (user, code, registration).
    discount_usages (id) {
        id -> Uuid,
        user_id -> Uuid,
        discount_code -> Varchar,
        registration_id -> Uuid,
        amount_saved_minor -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Transactional email outbox, drained by a separate dispatch worker.
    email_outbox (id) {
        id -> Uuid,
        recipient_user_id -> Uuid,
        /// Message template discriminator.
        kind -> Varchar,
        payload -> Jsonb,
        created_at -> Timestamptz,
        dispatched_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(reservations -> registration_categories (category_id));
diesel::joinable!(staging_line_items -> staging_invoices (invoice_id));
diesel::joinable!(staging_payments -> staging_invoices (invoice_id));

diesel::allow_tables_to_appear_in_same_query!(
    registration_categories,
    reservations,
    staging_invoices,
    staging_line_items,
    staging_payments,
);
