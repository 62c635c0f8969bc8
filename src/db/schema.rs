diesel::table! {
    account_links (id) {
        id -> BigInt,
        platform_identity -> BigInt,
        account_name -> Text,
        account_name_key -> Text,
        active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tracked_competitions (id) {
        id -> BigInt,
        external_competition_id -> BigInt,
        verification_secret -> Text,
        thread_ref -> Nullable<BigInt>,
        metric -> Text,
        kind -> Text,
        status -> Text,
        created_at -> Timestamptz,
        finished_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    scheduled_events (id) {
        id -> BigInt,
        kind -> Text,
        activity -> Text,
        location -> Text,
        scheduled_at -> Timestamptz,
        timezone -> Text,
        external_event_ref -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    event_participations (id) {
        id -> BigInt,
        event_id -> BigInt,
        account_link_id -> BigInt,
        notified -> Bool,
        created_at -> Timestamptz,
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
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    user_timezone_prefs (platform_identity) {
        platform_identity -> BigInt,
        timezone -> Text,
        updated_at -> Timestamptz,
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
