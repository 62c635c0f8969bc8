use crate::tracker::Standing;

/// Number of places announced when a competition finishes.
pub const PODIUM_SIZE: usize = 3;

/// Orders standings by gained progress, highest first. Equal values keep the
/// order the tracking service returned them in.
pub fn rank(mut standings: Vec<Standing>) -> Vec<Standing> {
    // sort_by is stable
    standings.sort_by(|a, b| b.progress.gained.cmp(&a.progress.gained));
    standings
}

pub fn top_n(ranked: Vec<Standing>, n: usize) -> Vec<Standing> {
    ranked.into_iter().take(n).collect()
}

/// Ranked podium with non-positive entries removed.
pub fn podium(standings: Vec<Standing>) -> Vec<Standing> {
    top_n(rank(standings), PODIUM_SIZE)
        .into_iter()
        .filter(|s| s.progress.gained > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{podium, rank, top_n};
    use crate::tracker::{Progress, Standing};

    fn standing(name: &str, gained: i64) -> Standing {
        Standing {
            account_name: name.to_lowercase(),
            display_name: name.to_string(),
            progress: Progress {
                start: 100,
                end: 100 + gained,
                gained,
            },
        }
    }

    #[test]
    fn top_three_of_ten_in_descending_order() {
        let input: Vec<_> = [5, 90, 12, 44, 3, 70, 18, 61, 29, 8]
            .iter()
            .enumerate()
            .map(|(i, g)| standing(&format!("p{i}"), *g))
            .collect();

        let top = top_n(rank(input), 3);
        let gained: Vec<_> = top.iter().map(|s| s.progress.gained).collect();
        assert_eq!(gained, vec![90, 70, 61]);
    }

    #[test]
    fn ties_keep_service_order() {
        let ranked = rank(vec![
            standing("Alpha", 10),
            standing("Bravo", 20),
            standing("Charlie", 10),
            standing("Delta", 20),
        ]);
        let names: Vec<_> = ranked.iter().map(|s| s.display_name.as_str()).collect();
        assert_eq!(names, vec!["Bravo", "Delta", "Alpha", "Charlie"]);
    }

    #[test]
    fn top_n_handles_short_lists() {
        assert_eq!(top_n(vec![standing("Solo", 1)], 3).len(), 1);
        assert!(top_n(Vec::new(), 3).is_empty());
    }

    #[test]
    fn podium_drops_entrants_without_progress() {
        let winners = podium(vec![
            standing("Idle", 0),
            standing("Grinder", 250),
            standing("Negative", -4),
            standing("Casual", 15),
        ]);
        let names: Vec<_> = winners.iter().map(|s| s.display_name.as_str()).collect();
        assert_eq!(names, vec!["Grinder", "Casual"]);

        assert!(podium(vec![standing("Idle", 0), standing("Afk", 0)]).is_empty());
    }
}
