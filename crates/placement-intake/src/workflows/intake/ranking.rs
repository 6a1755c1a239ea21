//! Rank allocation: an injective partial mapping from rank positions `1..=N` to catalog sites.
//!
//! Exclusion is always recomputed from the full current assignment and only looks at
//! lower-numbered ranks, so editing rank 1 never hides the site rank 3 already holds.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::catalog::SiteCatalog;
use super::domain::{Selection, Site};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankAllocation {
    slots: Vec<Selection<Site>>,
}

impl RankAllocation {
    pub fn unset(rank_count: usize) -> Self {
        Self {
            slots: vec![Selection::Unselected; rank_count],
        }
    }

    /// Rebuild an allocation from stored slots without checking for duplicates; submit-time
    /// validation reports any that slipped through.
    pub fn from_slots(slots: Vec<Selection<Site>>) -> Self {
        Self { slots }
    }

    pub fn rank_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Selection<Site>] {
        &self.slots
    }

    pub fn get(&self, rank: usize) -> Option<&Selection<Site>> {
        rank.checked_sub(1).and_then(|index| self.slots.get(index))
    }

    /// Lowest rank currently holding `site`.
    pub fn rank_of(&self, site: &Site) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_selected() == Some(site))
            .map(|index| index + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankError {
    #[error("rank {rank} is outside 1..={rank_count}")]
    OutOfRange { rank: usize, rank_count: usize },
    #[error("'{site}' is already ranked {held_by}")]
    Conflict { site: Site, held_by: usize },
    #[error("'{0}' is not in the site catalog")]
    UnknownSite(Site),
}

fn check_range(rank: usize, assignment: &RankAllocation) -> Result<(), RankError> {
    if rank == 0 || rank > assignment.rank_count() {
        return Err(RankError::OutOfRange {
            rank,
            rank_count: assignment.rank_count(),
        });
    }
    Ok(())
}

/// Choices offered at `rank`: the unselected marker, then every catalog site not claimed by a
/// lower rank. The rank's own current site stays selectable.
pub fn options_for_rank(
    catalog: &SiteCatalog,
    rank: usize,
    assignment: &RankAllocation,
) -> Result<Vec<Selection<Site>>, RankError> {
    check_range(rank, assignment)?;

    let own = assignment.get(rank).and_then(Selection::as_selected);
    let claimed_below: HashSet<&Site> = assignment.slots[..rank - 1]
        .iter()
        .filter_map(Selection::as_selected)
        .collect();

    let mut options = vec![Selection::Unselected];
    options.extend(
        catalog
            .sites()
            .iter()
            .filter(|site| !claimed_below.contains(site) || own == Some(*site))
            .cloned()
            .map(Selection::Selected),
    );
    Ok(options)
}

/// Assign `selection` to `rank`, refusing a site already held by a different rank.
pub fn set_rank(
    catalog: &SiteCatalog,
    rank: usize,
    selection: Selection<Site>,
    assignment: &RankAllocation,
) -> Result<RankAllocation, RankError> {
    check_range(rank, assignment)?;

    if let Selection::Selected(site) = &selection {
        if !catalog.contains(site) {
            return Err(RankError::UnknownSite(site.clone()));
        }

        let held_elsewhere = assignment
            .slots
            .iter()
            .enumerate()
            .find(|(index, slot)| index + 1 != rank && slot.as_selected() == Some(site));
        if let Some((index, _)) = held_elsewhere {
            return Err(RankError::Conflict {
                site: site.clone(),
                held_by: index + 1,
            });
        }
    }

    let mut next = assignment.clone();
    next.slots[rank - 1] = selection;
    Ok(next)
}

/// Submit-time checks: one message per unset rank, then one per duplicated site. Both kinds are
/// always reported together.
pub fn completeness_errors(assignment: &RankAllocation) -> Vec<String> {
    let mut messages: Vec<String> = assignment
        .slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| !slot.is_selected())
        .map(|(index, _)| format!("Choose a placement site for rank {}.", index + 1))
        .collect();

    let mut reported = HashSet::new();
    for slot in &assignment.slots {
        let Some(site) = slot.as_selected() else {
            continue;
        };
        let ranks: Vec<String> = assignment
            .slots
            .iter()
            .enumerate()
            .filter(|(_, other)| other.as_selected() == Some(site))
            .map(|(index, _)| (index + 1).to_string())
            .collect();
        if ranks.len() > 1 && reported.insert(site) {
            messages.push(format!(
                "'{}' is ranked more than once (ranks {}).",
                site,
                ranks.join(", ")
            ));
        }
    }

    messages
}

/// Both directions of the rank/site relationship, ready for flat tabular storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankProjection {
    pub by_rank: Vec<(usize, Option<Site>)>,
    pub by_site: Vec<(Site, Option<usize>)>,
}

pub fn project(catalog: &SiteCatalog, assignment: &RankAllocation) -> RankProjection {
    let by_rank = assignment
        .slots
        .iter()
        .enumerate()
        .map(|(index, slot)| (index + 1, slot.as_selected().cloned()))
        .collect();

    let by_site = catalog
        .sites()
        .iter()
        .map(|site| (site.clone(), assignment.rank_of(site)))
        .collect();

    RankProjection { by_rank, by_site }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SiteCatalog {
        SiteCatalog::new(["A", "B", "C"]).expect("catalog")
    }

    fn site(name: &str) -> Site {
        Site::new(name)
    }

    fn selected(name: &str) -> Selection<Site> {
        Selection::Selected(site(name))
    }

    #[test]
    fn lower_ranks_exclude_their_sites_from_later_ranks() {
        let catalog = catalog();
        let assignment = RankAllocation::unset(3);
        let assignment = set_rank(&catalog, 1, selected("A"), &assignment).expect("rank 1");
        let assignment = set_rank(&catalog, 2, selected("B"), &assignment).expect("rank 2");

        let options = options_for_rank(&catalog, 3, &assignment).expect("options");
        assert_eq!(options, vec![Selection::Unselected, selected("C")]);
    }

    #[test]
    fn editing_a_lower_rank_lifts_its_previous_exclusion() {
        let catalog = catalog();
        let assignment = RankAllocation::unset(3);
        let assignment = set_rank(&catalog, 1, selected("A"), &assignment).expect("rank 1");
        let assignment = set_rank(&catalog, 2, selected("B"), &assignment).expect("rank 2");
        let assignment = set_rank(&catalog, 1, selected("C"), &assignment).expect("rank 1 again");

        let options = options_for_rank(&catalog, 2, &assignment).expect("options");
        assert_eq!(
            options,
            vec![Selection::Unselected, selected("A"), selected("B")]
        );
    }

    #[test]
    fn rank_keeps_its_own_choice_and_ignores_higher_ranks() {
        let catalog = catalog();
        let assignment = RankAllocation::unset(3);
        let assignment = set_rank(&catalog, 3, selected("A"), &assignment).expect("rank 3");

        let options = options_for_rank(&catalog, 1, &assignment).expect("options");
        assert!(options.contains(&selected("A")));

        let restored = RankAllocation::from_slots(vec![selected("A"), selected("A")]);
        let options = options_for_rank(&catalog, 2, &restored).expect("options");
        assert!(options.contains(&selected("A")));
    }

    #[test]
    fn set_rank_rejects_site_held_by_another_rank() {
        let catalog = catalog();
        let assignment = set_rank(&catalog, 3, selected("C"), &RankAllocation::unset(3))
            .expect("rank 3");

        let err = set_rank(&catalog, 1, selected("C"), &assignment).expect_err("conflict");
        assert_eq!(
            err,
            RankError::Conflict {
                site: site("C"),
                held_by: 3
            }
        );

        let same = set_rank(&catalog, 3, selected("C"), &assignment).expect("idempotent");
        assert_eq!(same, assignment);
    }

    #[test]
    fn set_rank_validates_range_and_catalog_membership() {
        let catalog = catalog();
        let assignment = RankAllocation::unset(3);

        assert!(matches!(
            set_rank(&catalog, 0, selected("A"), &assignment),
            Err(RankError::OutOfRange { rank: 0, .. })
        ));
        assert!(matches!(
            options_for_rank(&catalog, 4, &assignment),
            Err(RankError::OutOfRange { rank: 4, rank_count: 3 })
        ));
        assert_eq!(
            set_rank(&catalog, 1, selected("Z"), &assignment),
            Err(RankError::UnknownSite(site("Z")))
        );
    }

    #[test]
    fn unselecting_a_rank_frees_the_site() {
        let catalog = catalog();
        let assignment = set_rank(&catalog, 1, selected("A"), &RankAllocation::unset(3))
            .expect("rank 1");
        let assignment =
            set_rank(&catalog, 1, Selection::Unselected, &assignment).expect("clear rank 1");

        assert!(set_rank(&catalog, 2, selected("A"), &assignment).is_ok());
    }

    #[test]
    fn assignment_never_holds_a_site_twice_across_edit_sequences() {
        let catalog = catalog();
        let names = ["A", "B", "C"];
        let mut assignment = RankAllocation::unset(3);

        for step in 0..27usize {
            let rank = step % 3 + 1;
            let name = names[(step / 3) % 3];
            if let Ok(next) = set_rank(&catalog, rank, selected(name), &assignment) {
                assignment = next;
            }

            let chosen: Vec<&Site> = assignment
                .slots()
                .iter()
                .filter_map(Selection::as_selected)
                .collect();
            let unique: HashSet<&Site> = chosen.iter().copied().collect();
            assert_eq!(chosen.len(), unique.len(), "duplicate after step {step}");
        }
    }

    #[test]
    fn completeness_reports_unset_ranks_and_duplicates_together() {
        let all_unset = completeness_errors(&RankAllocation::unset(3));
        assert_eq!(
            all_unset,
            vec![
                "Choose a placement site for rank 1.",
                "Choose a placement site for rank 2.",
                "Choose a placement site for rank 3.",
            ]
        );

        let restored = RankAllocation::from_slots(vec![
            selected("C"),
            Selection::Unselected,
            selected("C"),
        ]);
        let messages = completeness_errors(&restored);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("rank 2"));
        assert!(messages[1].contains("'C' is ranked more than once (ranks 1, 3)"));
    }

    #[test]
    fn projection_lists_both_directions() {
        let catalog = catalog();
        let assignment = RankAllocation::from_slots(vec![
            selected("B"),
            selected("A"),
            Selection::Unselected,
        ]);

        let projection = project(&catalog, &assignment);
        assert_eq!(
            projection.by_rank,
            vec![(1, Some(site("B"))), (2, Some(site("A"))), (3, None)]
        );
        assert_eq!(
            projection.by_site,
            vec![(site("A"), Some(2)), (site("B"), Some(1)), (site("C"), None)]
        );
    }
}
