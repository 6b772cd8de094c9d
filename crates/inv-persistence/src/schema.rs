//! Esquema Diesel (mantenido a mano; reemplazable con `diesel print-schema`).

diesel::table! {
    event_log (id) {
        id -> BigInt,
        investigation_id -> Text,
        seq -> BigInt,
        ts -> Text,
        event_type -> Text,
        parent_seq -> Nullable<BigInt>,
        payload -> Text,
    }
}

diesel::table! {
    artifacts (artifact_hash) {
        artifact_hash -> Text,
        kind -> Text,
        size -> BigInt,
        payload -> Text,
        investigation_id -> Text,
        produced_in_seq -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(event_log, artifacts,);
