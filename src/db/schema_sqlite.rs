// SQLite schema definitions
// Mirrors schema.rs with INTEGER row ids and RFC 3339 text timestamps

diesel::table! {
    account_links (id) {
        id -> Integer,
        platform_identity -> BigInt,
        account_name -> Text,
        account_name_key -> Text,
        active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    tracked_competitions (id) {
        id -> Integer,
        external_competition_id -> BigInt,
        verification_secret -> Text,
        thread_ref -> Nullable<BigInt>,
        metric -> Text,
        kind -> Text,
        status -> Text,
        created_at -> Text,
        finished_at -> Nullable<Text>,
    }
}

diesel::table! {
    scheduled_events (id) {
        id -> Integer,
        kind -> Text,
        activity -> Text,
        location -> Text,
        scheduled_at -> Text,
        timezone -> Text,
        external_event_ref -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    event_participations (id) {
        id -> Integer,
        event_id -> Integer,
        account_link_id -> Integer,
        notified -> Bool,
        created_at -> Text,
    }
}

diesel::table! {
    guild_configs (guild_id) {
        guild_id -> BigInt,
        coordinator_role_id -> Nullable<BigInt>,
        default_timezone -> Nullable<Text>,
        competition_code_channel_id -> Nullable<BigInt>,
        event_notification_channel_id -> Nullable<BigInt>,
        event_notification_role_id -> Nullable<BigInt>,
        updated_at -> Text,
    }
}

diesel::table! {
    user_timezone_prefs (platform_identity) {
        platform_identity -> BigInt,
        timezone -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(event_participations -> scheduled_events (event_id));
diesel::joinable!(event_participations -> account_links (account_link_id));

diesel::allow_tables_to_appear_in_same_query!(
    account_links,
    tracked_competitions,
    scheduled_events,
    event_participations,
    guild_configs,
    user_timezone_prefs,
);
