use serde::Deserialize;

/// The two record categories the API exposes per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Post,
    Comment,
}

impl ItemKind {
    /// Path segment used by both the listing and voting endpoints.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ItemKind::Post => "posts",
            ItemKind::Comment => "comments",
        }
    }

    /// Short prefix used to build fingerprints, e.g. `p-123` / `c-456`.
    pub fn prefix(&self) -> &'static str {
        match self {
            ItemKind::Post => "p",
            ItemKind::Comment => "c",
        }
    }

    pub fn plural(&self) -> &'static str {
        self.endpoint()
    }
}

/// One post or comment as returned by the listing endpoints. Only the
/// fields the voting flow needs are deserialized; the rest of the payload
/// is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: u64,
    /// `null` means the owning account has not voted on this item yet.
    /// The API also reports `0` for a retracted vote, which counts as
    /// "not voted" for our purposes.
    #[serde(default)]
    pub user_vote: Option<i64>,
    #[serde(default)]
    pub domain: Option<Domain>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Domain {
    #[serde(default)]
    pub is_voting_disabled: bool,
}

impl Item {
    /// Whether this item can receive a vote at all: no standing vote from
    /// the owning account, and the hosting domain has not switched voting
    /// off. Items failing this never enter the queue.
    pub fn votable(&self) -> bool {
        let unvoted = matches!(self.user_vote, None | Some(0));
        let disabled = self
            .domain
            .as_ref()
            .map(|d| d.is_voting_disabled)
            .unwrap_or(false);
        unvoted && !disabled
    }
}

/// One scheduled vote. Created once per eligible item and carried through
/// the queue until it completes or is dropped; retries re-submit the same
/// value rather than rebuilding it.
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ItemKind,
    pub id: u64,
    pub vote: i8,
}

impl Action {
    pub fn new(kind: ItemKind, id: u64, vote: i8) -> Self {
        Self { kind, id, vote }
    }

    /// Stable ledger key for this action's item, e.g. `p-82411`.
    pub fn fingerprint(&self) -> String {
        format!("{}-{}", self.kind.prefix(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(user_vote: Option<i64>, disabled: Option<bool>) -> Item {
        Item {
            id: 1,
            user_vote,
            domain: disabled.map(|is_voting_disabled| Domain { is_voting_disabled }),
        }
    }

    #[test]
    fn test_unvoted_item_is_votable() {
        assert!(item(None, None).votable());
        assert!(item(None, Some(false)).votable());
    }

    #[test]
    fn test_retracted_vote_counts_as_unvoted() {
        assert!(item(Some(0), None).votable());
    }

    #[test]
    fn test_existing_vote_blocks() {
        assert!(!item(Some(-1), None).votable());
        assert!(!item(Some(1), None).votable());
    }

    #[test]
    fn test_disabled_domain_blocks() {
        assert!(!item(None, Some(true)).votable());
    }

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(Action::new(ItemKind::Post, 123, -1).fingerprint(), "p-123");
        assert_eq!(
            Action::new(ItemKind::Comment, 456, -1).fingerprint(),
            "c-456"
        );
    }

    #[test]
    fn test_item_deserializes_with_missing_fields() {
        let item: Item = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(item.id, 7);
        assert!(item.votable());

        let item: Item = serde_json::from_str(
            r#"{"id": 8, "user_vote": -1, "domain": {"is_voting_disabled": true}}"#,
        )
        .unwrap();
        assert!(!item.votable());
    }
}
