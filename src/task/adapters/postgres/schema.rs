//! Diesel schema for task persistence and the work-distribution outbox.

diesel::table! {
    /// Task records and their lifecycle columns.
    tasks (id) {
        /// Store-assigned task identifier.
        id -> Int8,
        /// Task title.
        #[max_length = 255]
        title -> Varchar,
        /// Optional free-text description.
        description -> Nullable<Text>,
        /// Scheduling priority.
        #[max_length = 16]
        priority -> Varchar,
        /// Lifecycle status.
        #[max_length = 16]
        status -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// First entry into `in_progress`.
        started_at -> Nullable<Timestamptz>,
        /// Entry into a terminal status.
        completed_at -> Nullable<Timestamptz>,
        /// Outcome summary recorded on completion.
        result -> Nullable<Text>,
        /// Failure or cancellation explanation.
        error_info -> Nullable<Text>,
    }
}

diesel::table! {
    /// Transient work-distribution outbox; rows are deleted on acknowledgement.
    task_outbox (id) {
        /// Outbox entry identifier.
        id -> Int8,
        /// Referenced task identifier.
        task_id -> Int8,
        /// Wire priority attached at publish time.
        priority -> Int2,
        /// Serialized queue message payload.
        payload -> Text,
        /// Earliest time the entry may be (re)delivered.
        available_at -> Timestamptz,
        /// Number of deliveries so far.
        delivery_count -> Int4,
        /// Publication timestamp.
        enqueued_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(tasks, task_outbox);
