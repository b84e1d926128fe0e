//! Assignment of pages to stores and the page orders built from it.
//!
//! A purchase order can span several pages and only its first page is
//! guaranteed to carry the store code, so a page without a code belongs to
//! the most recently seen code, across source boundaries. Pages before the
//! first code go to the first code's group.

use indexmap::IndexMap;

use crate::models::{PageRecord, PageRef, StoreCode};
use crate::roster::CodeIndex;

/// Pages grouped by store code, in first-seen code order.
#[derive(Debug, Clone, Default)]
pub struct PageGroups {
    groups: IndexMap<StoreCode, Vec<PageRef>>,
    leading: usize,
    orphans: Vec<PageRef>,
}

impl PageGroups {
    /// Group scanned pages. `records` must be in scan order.
    pub fn build(records: &[PageRecord]) -> Self {
        let mut groups: IndexMap<StoreCode, Vec<PageRef>> = IndexMap::new();
        let mut current: Option<&StoreCode> = None;
        let mut leading = Vec::new();

        for record in records {
            if let Some(code) = &record.code {
                current = Some(code);
            }
            match current {
                Some(code) => groups.entry(code.clone()).or_default().push(record.page_ref),
                None => leading.push(record.page_ref),
            }
        }

        let leading_count = leading.len();
        let orphans = match groups.get_index_mut(0) {
            Some((_, first)) => {
                leading.append(first);
                *first = leading;
                Vec::new()
            }
            None => leading,
        };

        Self {
            groups,
            leading: leading_count,
            orphans,
        }
    }

    /// Groups in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&StoreCode, &[PageRef])> {
        self.groups.iter().map(|(code, pages)| (code, pages.as_slice()))
    }

    pub fn pages_for(&self, code: &StoreCode) -> Option<&[PageRef]> {
        self.groups.get(code).map(|pages| pages.as_slice())
    }

    /// The code that received the leading pages.
    pub fn first_code(&self) -> Option<&StoreCode> {
        self.groups.get_index(0).map(|(code, _)| code)
    }

    /// Number of pages seen before the first store code.
    pub fn leading_count(&self) -> usize {
        self.leading
    }

    /// Pages that belong to no store (no code was found anywhere).
    pub fn orphans(&self) -> &[PageRef] {
        &self.orphans
    }

    /// Roster codes in roster order, then extra codes in first-seen order,
    /// then orphan pages. Every grouped page appears exactly once.
    pub fn roster_order(&self, index: &CodeIndex) -> Vec<PageRef> {
        let mut order = Vec::new();

        for entry in index.entries() {
            if let Some(pages) = self.groups.get(&entry.code) {
                order.extend_from_slice(pages);
            }
        }
        for (code, pages) in &self.groups {
            if !index.contains(code) {
                order.extend_from_slice(pages);
            }
        }
        order.extend_from_slice(&self.orphans);

        order
    }
}

/// Source-list order, then page order within each source.
pub fn source_order(records: &[PageRecord]) -> Vec<PageRef> {
    let mut order: Vec<PageRef> = records.iter().map(|r| r.page_ref).collect();
    order.sort();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RosterEntry;
    use pretty_assertions::assert_eq;

    fn record(source: usize, page: u32, code: Option<&str>) -> PageRecord {
        PageRecord {
            source_id: format!("src{}", source),
            page_ref: PageRef::new(source, page),
            raw_text: String::new(),
            code: code.map(StoreCode::new),
            quantity: None,
            date: None,
        }
    }

    #[test]
    fn test_pages_follow_current_code_across_sources() {
        let records = vec![
            record(0, 1, Some("SG0002")),
            record(0, 2, None),
            record(1, 1, None),
            record(1, 2, Some("SG0001")),
        ];

        let groups = PageGroups::build(&records);

        assert_eq!(
            groups.pages_for(&StoreCode::new("SG0002")).unwrap(),
            &[PageRef::new(0, 1), PageRef::new(0, 2), PageRef::new(1, 1)]
        );
        assert_eq!(
            groups.pages_for(&StoreCode::new("SG0001")).unwrap(),
            &[PageRef::new(1, 2)]
        );
        assert_eq!(groups.leading_count(), 0);
    }

    #[test]
    fn test_leading_pages_join_first_code() {
        let records = vec![
            record(0, 1, None),
            record(0, 2, Some("SG0005")),
            record(0, 3, Some("SG0006")),
        ];

        let groups = PageGroups::build(&records);

        assert_eq!(groups.leading_count(), 1);
        assert_eq!(groups.first_code(), Some(&StoreCode::new("SG0005")));
        assert_eq!(
            groups.pages_for(&StoreCode::new("SG0005")).unwrap(),
            &[PageRef::new(0, 1), PageRef::new(0, 2)]
        );
        assert!(groups.orphans().is_empty());
    }

    #[test]
    fn test_no_codes_leaves_orphans() {
        let records = vec![record(0, 1, None), record(0, 2, None)];

        let groups = PageGroups::build(&records);

        assert_eq!(groups.leading_count(), 2);
        assert_eq!(groups.first_code(), None);
        assert_eq!(groups.orphans(), &[PageRef::new(0, 1), PageRef::new(0, 2)]);
    }

    #[test]
    fn test_roster_order_puts_extras_last() {
        let records = vec![
            record(0, 1, Some("SG0009")),
            record(0, 2, Some("SG0002")),
            record(1, 1, Some("SG0001")),
            record(1, 2, None),
        ];
        let index = CodeIndex::from_entries([
            RosterEntry::new(StoreCode::new("SG0001")),
            RosterEntry::new(StoreCode::new("SG0002")),
            RosterEntry::new(StoreCode::new("SG0003")),
        ]);

        let order = PageGroups::build(&records).roster_order(&index);

        assert_eq!(
            order,
            vec![
                PageRef::new(1, 1),
                PageRef::new(1, 2),
                PageRef::new(0, 2),
                PageRef::new(0, 1),
            ]
        );
    }

    #[test]
    fn test_repeated_code_segments_merge_into_one_group() {
        let records = vec![
            record(0, 1, Some("SG0001")),
            record(0, 2, Some("SG0002")),
            record(0, 3, Some("SG0001")),
        ];

        let groups = PageGroups::build(&records);

        assert_eq!(
            groups.pages_for(&StoreCode::new("SG0001")).unwrap(),
            &[PageRef::new(0, 1), PageRef::new(0, 3)]
        );
    }

    #[test]
    fn test_source_order() {
        let records = vec![record(1, 1, None), record(0, 2, None), record(0, 1, None)];
        assert_eq!(
            source_order(&records),
            vec![PageRef::new(0, 1), PageRef::new(0, 2), PageRef::new(1, 1)]
        );
    }
}
