//! Routing for message components and modals. Custom ids use the
//! `action:data` format.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::db::{CompetitionKind, EventKind};

pub const LINK_MODAL_ID: &str = "link-rsn-modal";
pub const LINK_INPUT_ID: &str = "rsn-input";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentAction {
    ConfirmLink,
    CancelLink,
    RegisterCompetition(CompetitionKind),
    ListCompetition(CompetitionKind),
    ParticipateEvent(EventKind),
    ListEvent(EventKind),
}

static COMPONENT_ROUTES: Lazy<HashMap<&'static str, ComponentAction>> = Lazy::new(|| {
    use ComponentAction::*;

    let mut routes = HashMap::new();
    routes.insert("confirm-rsn", ConfirmLink);
    routes.insert("cancel-rsn", CancelLink);
    for kind in [CompetitionKind::BossOfTheWeek, CompetitionKind::SkillOfTheWeek] {
        routes.insert(register_action(kind), RegisterCompetition(kind));
        routes.insert(list_action(kind), ListCompetition(kind));
    }
    for kind in [EventKind::Mass, EventKind::WildyWednesday] {
        routes.insert(kind.participate_action(), ParticipateEvent(kind));
        routes.insert(kind.list_action(), ListEvent(kind));
    }
    routes
});

pub fn register_action(kind: CompetitionKind) -> &'static str {
    match kind {
        CompetitionKind::BossOfTheWeek => "register-for-botw",
        CompetitionKind::SkillOfTheWeek => "register-for-sotw",
    }
}

pub fn list_action(kind: CompetitionKind) -> &'static str {
    match kind {
        CompetitionKind::BossOfTheWeek => "list-participants-botw",
        CompetitionKind::SkillOfTheWeek => "list-participants-sotw",
    }
}

/// Resolves a component custom id to its action and payload. Ids without a
/// payload carry an empty one.
pub fn route_component(custom_id: &str) -> Option<(ComponentAction, &str)> {
    let (action, data) = custom_id.split_once(':').unwrap_or((custom_id, ""));
    COMPONENT_ROUTES.get(action).map(|route| (*route, data))
}

/// Payload of a competition register button: `competitionId,threadId`.
pub fn parse_register_data(data: &str) -> Option<(i64, Option<i64>)> {
    let (competition, thread) = data.split_once(',').unwrap_or((data, ""));
    let competition = competition.trim().parse().ok()?;
    let thread = thread.trim().parse().ok().filter(|id: &i64| *id > 0);
    Some((competition, thread))
}

pub fn register_data(external_id: i64, thread_ref: Option<i64>) -> String {
    format!("{external_id},{}", thread_ref.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("confirm-rsn:Zezima", ComponentAction::ConfirmLink, "Zezima")]
    #[test_case("cancel-rsn:Lynx Titan", ComponentAction::CancelLink, "Lynx Titan")]
    #[test_case(
        "register-for-botw:12,34",
        ComponentAction::RegisterCompetition(CompetitionKind::BossOfTheWeek),
        "12,34"
    )]
    #[test_case(
        "list-participants-sotw:12",
        ComponentAction::ListCompetition(CompetitionKind::SkillOfTheWeek),
        "12"
    )]
    #[test_case(
        "participate-mass:998877",
        ComponentAction::ParticipateEvent(EventKind::Mass),
        "998877"
    )]
    #[test_case(
        "participate-wildy:445566",
        ComponentAction::ParticipateEvent(EventKind::WildyWednesday),
        "445566"
    )]
    #[test_case(
        "list-participants-mass:998877",
        ComponentAction::ListEvent(EventKind::Mass),
        "998877"
    )]
    fn routes_known_actions(custom_id: &str, action: ComponentAction, data: &str) {
        assert_eq!(route_component(custom_id), Some((action, data)));
    }

    #[test_case("unknown:1" ; "unknown action")]
    #[test_case("" ; "empty")]
    #[test_case("register-for-cotw:1" ; "near miss")]
    fn ignores_unknown_actions(custom_id: &str) {
        assert_eq!(route_component(custom_id), None);
    }

    #[test]
    fn data_may_contain_colons() {
        assert_eq!(
            route_component("confirm-rsn:a:b"),
            Some((ComponentAction::ConfirmLink, "a:b"))
        );
    }

    #[test]
    fn register_payload_round_trips_thread() {
        assert_eq!(parse_register_data(&register_data(12, Some(34))), Some((12, Some(34))));
        assert_eq!(parse_register_data(&register_data(12, None)), Some((12, None)));
        assert_eq!(parse_register_data("12"), Some((12, None)));
        assert_eq!(parse_register_data("abc,1"), None);
    }
}
