//! Slash command definitions and the command path dispatch table.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption};

use crate::accounts::MAX_ACCOUNT_NAME_LEN;
use crate::db::{CompetitionKind, EventKind};

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Anyone,
    Coordinator,
    Administrator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRoute {
    LinkAccount,
    UnlinkAccount,
    StartCompetition(CompetitionKind),
    FinishCompetition(CompetitionKind),
    ScheduleEvent(EventKind),
    UpcomingEvents,
    ShowConfig,
    SetCoordinatorRole,
    SetCompetitionCodeChannel,
    SetEventNotificationChannel,
    SetEventNotificationRole,
    SetDefaultTimezone,
    SetMyTimezone,
}

impl CommandRoute {
    pub fn access(&self) -> Access {
        match self {
            CommandRoute::LinkAccount
            | CommandRoute::UnlinkAccount
            | CommandRoute::UpcomingEvents
            | CommandRoute::SetMyTimezone => Access::Anyone,
            CommandRoute::StartCompetition(_)
            | CommandRoute::FinishCompetition(_)
            | CommandRoute::ScheduleEvent(_) => Access::Coordinator,
            CommandRoute::ShowConfig
            | CommandRoute::SetCoordinatorRole
            | CommandRoute::SetCompetitionCodeChannel
            | CommandRoute::SetEventNotificationChannel
            | CommandRoute::SetEventNotificationRole
            | CommandRoute::SetDefaultTimezone => Access::Administrator,
        }
    }
}

static COMMAND_ROUTES: Lazy<HashMap<&'static str, CommandRoute>> = Lazy::new(|| {
    use CommandRoute::*;

    HashMap::from([
        ("link-rsn", LinkAccount),
        ("unlink-rsn", UnlinkAccount),
        ("botw start", StartCompetition(CompetitionKind::BossOfTheWeek)),
        ("botw finish", FinishCompetition(CompetitionKind::BossOfTheWeek)),
        ("sotw start", StartCompetition(CompetitionKind::SkillOfTheWeek)),
        ("sotw finish", FinishCompetition(CompetitionKind::SkillOfTheWeek)),
        ("mass", ScheduleEvent(EventKind::Mass)),
        ("wildy", ScheduleEvent(EventKind::WildyWednesday)),
        ("events", UpcomingEvents),
        ("config show", ShowConfig),
        ("config coordinator-role", SetCoordinatorRole),
        ("config competition-code-channel", SetCompetitionCodeChannel),
        ("config event-channel", SetEventNotificationChannel),
        ("config event-role", SetEventNotificationRole),
        ("config default-timezone", SetDefaultTimezone),
        ("config set-my-timezone", SetMyTimezone),
    ])
});

/// Looks up a command path such as `botw start`.
pub fn route_command(path: &str) -> Option<CommandRoute> {
    COMMAND_ROUTES.get(path).copied()
}

/// Boss metrics offered for Boss of the Week, grouped as in game.
pub const BOSSES: &[(&str, &str)] = &[
    ("King Black Dragon", "king_black_dragon"),
    ("Scorpia", "scorpia"),
    ("Artio", "artio"),
    ("Callisto", "callisto"),
    ("Calvarion", "calvarion"),
    ("Chaos Elemental", "chaos_elemental"),
    ("Chaos Fanatic", "chaos_fanatic"),
    ("Crazy Archaeologist", "crazy_archaeologist"),
    ("Spindel", "spindel"),
    ("Venenatis", "venenatis"),
    ("Vet'ion", "vetion"),
    ("Corporeal Beast", "corporeal_beast"),
    ("Nex", "nex"),
    ("Nightmare", "nightmare"),
    ("Commander Zilyana (Saradomin)", "commander_zilyana"),
    ("K'ril Tsutsaroth (Zamorak)", "kril_tsutsaroth"),
    ("General Graardor (Bandos)", "general_graardor"),
    ("Kree'arra (Armadyl)", "kreearra"),
    ("Duke Sucellus", "duke_sucellus"),
    ("The Leviathan", "the_leviathan"),
    ("The Whisperer", "the_whisperer"),
    ("Vardorvis", "vardorvis"),
    ("Phantom Muspah", "phantom_muspah"),
    ("The Gauntlet", "the_gauntlet"),
    ("The Corrupted Gauntlet", "the_corrupted_gauntlet"),
    ("Vorkath", "vorkath"),
    ("Zalcano", "zalcano"),
    ("Grotesque Guardians", "grotesque_guardians"),
    ("Abyssal Sire", "abyssal_sire"),
    ("Alchemical Hydra", "alchemical_hydra"),
    ("Thermonuclear Smoke Devil", "thermonuclear_smoke_devil"),
    ("Kraken", "kraken"),
    ("Cerberus", "cerberus"),
    ("Barrows Chests", "barrows_chests"),
    ("Giant Mole", "giant_mole"),
    ("Deranged Archaeologist", "deranged_archaeologist"),
    ("Dagannoth Prime", "dagannoth_prime"),
    ("Dagannoth Rex", "dagannoth_rex"),
    ("Dagannoth Supreme", "dagannoth_supreme"),
    ("Sarachnis", "sarachnis"),
    ("Kalphite Queen", "kalphite_queen"),
    ("Skotizo", "skotizo"),
];

/// Non-combat skills offered for Skill of the Week.
pub const SKILLS: &[(&str, &str)] = &[
    ("Prayer", "prayer"),
    ("Cooking", "cooking"),
    ("Woodcutting", "woodcutting"),
    ("Fletching", "fletching"),
    ("Fishing", "fishing"),
    ("Firemaking", "firemaking"),
    ("Crafting", "crafting"),
    ("Smithing", "smithing"),
    ("Mining", "mining"),
    ("Herblore", "herblore"),
    ("Agility", "agility"),
    ("Thieving", "thieving"),
    ("Slayer", "slayer"),
    ("Farming", "farming"),
    ("Runecraft", "runecraft"),
    ("Hunter", "hunter"),
    ("Construction", "construction"),
];

const MAX_CHOICES: usize = 25;

/// Metrics a competition of `kind` may track.
pub fn metrics_for(kind: CompetitionKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        CompetitionKind::BossOfTheWeek => BOSSES,
        CompetitionKind::SkillOfTheWeek => SKILLS,
    }
}

pub fn is_known_metric(kind: CompetitionKind, metric: &str) -> bool {
    metrics_for(kind).iter().any(|(_, value)| *value == metric)
}

/// Autocomplete over boss names and metric ids.
pub fn search_bosses(query: &str) -> Vec<(&'static str, &'static str)> {
    let query = query.trim().to_lowercase();
    BOSSES
        .iter()
        .copied()
        .filter(|(name, value)| name.to_lowercase().contains(&query) || value.contains(&query))
        .take(MAX_CHOICES)
        .collect()
}

fn timezone_option(description: &str, required: bool) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, "timezone", description)
        .required(required)
        .set_autocomplete(true)
}

fn competition_command(name: &str, description: &str, kind: CompetitionKind) -> CreateCommand {
    let metric_option = match kind {
        CompetitionKind::BossOfTheWeek => {
            CreateCommandOption::new(CommandOptionType::String, "boss", "Boss to track")
                .required(true)
                .set_autocomplete(true)
        }
        CompetitionKind::SkillOfTheWeek => SKILLS.iter().fold(
            CreateCommandOption::new(CommandOptionType::String, "skill", "Skill to track")
                .required(true),
            |option, (name, value)| option.add_string_choice(*name, *value),
        ),
    };

    CreateCommand::new(name)
        .description(description)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "start",
                format!("Start a new {} competition", kind.display_name()),
            )
            .add_sub_option(metric_option),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "finish",
            format!("Finish the running {} and announce winners", kind.display_name()),
        ))
}

fn event_command(name: &str, description: &str) -> CreateCommand {
    CreateCommand::new(name)
        .description(description)
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "activity", "What we are doing")
                .required(true)
                .max_length(100),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "location",
                "Where to meet, e.g. World 444",
            )
            .required(true)
            .max_length(100),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "time",
                "Start time as YYYY-MM-DD HH:MM",
            )
            .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "duration", "Length in minutes")
                .required(true)
                .min_int_value(1)
                .max_int_value(7 * 24 * 60),
        )
        .add_option(timezone_option("Timezone of the given time", false))
}

fn config_subcommand(name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::SubCommand, name, description)
}

pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("link-rsn").description("Link your Old School RuneScape account"),
        CreateCommand::new("unlink-rsn").description("Unlink your Old School RuneScape account"),
        competition_command("botw", "Boss of the Week", CompetitionKind::BossOfTheWeek),
        competition_command("sotw", "Skill of the Week", CompetitionKind::SkillOfTheWeek),
        event_command("mass", "Schedule a mass event"),
        event_command("wildy", "Schedule a Wildy Wednesday trip"),
        CreateCommand::new("events").description("Show the next scheduled events"),
        CreateCommand::new("config")
            .description("Server settings")
            .add_option(config_subcommand("show", "Show this server's settings"))
            .add_option(
                config_subcommand("coordinator-role", "Role allowed to run events").add_sub_option(
                    CreateCommandOption::new(CommandOptionType::Role, "role", "Coordinator role")
                        .required(true),
                ),
            )
            .add_option(
                config_subcommand(
                    "competition-code-channel",
                    "Channel that receives competition verification codes",
                )
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::Channel,
                        "channel",
                        "Private channel",
                    )
                    .required(true),
                ),
            )
            .add_option(
                config_subcommand("event-channel", "Channel for event announcements")
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::Channel,
                            "channel",
                            "Announcement channel",
                        )
                        .required(true),
                    ),
            )
            .add_option(
                config_subcommand("event-role", "Role pinged for new events").add_sub_option(
                    CreateCommandOption::new(CommandOptionType::Role, "role", "Role to ping")
                        .required(true),
                ),
            )
            .add_option(
                config_subcommand("default-timezone", "Default timezone for this server")
                    .add_sub_option(timezone_option("IANA timezone, e.g. Europe/London", true)),
            )
            .add_option(
                config_subcommand("set-my-timezone", "Your own timezone for event times")
                    .add_sub_option(timezone_option("IANA timezone, e.g. America/New_York", true)),
            ),
    ]
}

/// Longest name accepted by the link modal.
pub const LINK_INPUT_MAX: u16 = MAX_ACCOUNT_NAME_LEN as u16;

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("link-rsn", CommandRoute::LinkAccount, Access::Anyone)]
    #[test_case(
        "botw start",
        CommandRoute::StartCompetition(CompetitionKind::BossOfTheWeek),
        Access::Coordinator
    )]
    #[test_case(
        "sotw finish",
        CommandRoute::FinishCompetition(CompetitionKind::SkillOfTheWeek),
        Access::Coordinator
    )]
    #[test_case("mass", CommandRoute::ScheduleEvent(EventKind::Mass), Access::Coordinator)]
    #[test_case(
        "wildy",
        CommandRoute::ScheduleEvent(EventKind::WildyWednesday),
        Access::Coordinator
    )]
    #[test_case("events", CommandRoute::UpcomingEvents, Access::Anyone)]
    #[test_case(
        "config event-role",
        CommandRoute::SetEventNotificationRole,
        Access::Administrator
    )]
    #[test_case("config set-my-timezone", CommandRoute::SetMyTimezone, Access::Anyone)]
    fn routes_command_paths(path: &str, route: CommandRoute, access: Access) {
        assert_eq!(route_command(path), Some(route));
        assert_eq!(route.access(), access);
    }

    #[test_case("botw" ; "missing subcommand")]
    #[test_case("config" ; "bare group")]
    #[test_case("wotw start" ; "unknown command")]
    fn unknown_paths(path: &str) {
        assert_eq!(route_command(path), None);
    }

    #[test]
    fn every_defined_command_is_routed() {
        let names: Vec<_> = definitions()
            .into_iter()
            .filter_map(|c| serde_json::to_value(&c).ok())
            .filter_map(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
            .collect();
        assert_eq!(
            names,
            vec!["link-rsn", "unlink-rsn", "botw", "sotw", "mass", "wildy", "events", "config"]
        );
    }

    #[test]
    fn metrics_are_checked_per_kind() {
        assert!(is_known_metric(CompetitionKind::BossOfTheWeek, "nex"));
        assert!(!is_known_metric(CompetitionKind::BossOfTheWeek, "woodcutting"));
        assert!(is_known_metric(CompetitionKind::SkillOfTheWeek, "woodcutting"));
        assert!(SKILLS.len() <= MAX_CHOICES);
    }

    #[test]
    fn boss_search_matches_names_and_ids() {
        assert_eq!(search_bosses("kraken"), vec![("Kraken", "kraken")]);
        assert!(search_bosses("dagannoth").len() == 3);
        assert_eq!(search_bosses("").len(), MAX_CHOICES);
    }
}
