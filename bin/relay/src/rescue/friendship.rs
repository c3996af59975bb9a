use crate::store::TokenId;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Social graph lookup, owned by another service
#[async_trait::async_trait]
pub trait FriendshipOracle: Send + Sync {
    async fn is_friend(&self, a: TokenId, b: TokenId) -> bool;

    async fn friends_of(&self, token_id: TokenId) -> Vec<TokenId>;
}

/// Fixed set of accepted friendships, symmetric
#[derive(Default)]
pub struct StaticFriendships {
    pairs: RwLock<HashSet<(TokenId, TokenId)>>,
}

impl StaticFriendships {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: TokenId, b: TokenId) -> (TokenId, TokenId) {
        (a.min(b), a.max(b))
    }

    pub fn add(&self, a: TokenId, b: TokenId) {
        self.pairs.write().insert(Self::key(a, b));
    }

    pub fn remove(&self, a: TokenId, b: TokenId) {
        self.pairs.write().remove(&Self::key(a, b));
    }
}

#[async_trait::async_trait]
impl FriendshipOracle for StaticFriendships {
    async fn is_friend(&self, a: TokenId, b: TokenId) -> bool {
        a != b && self.pairs.read().contains(&Self::key(a, b))
    }

    async fn friends_of(&self, token_id: TokenId) -> Vec<TokenId> {
        let mut friends: Vec<TokenId> = self
            .pairs
            .read()
            .iter()
            .filter_map(|(a, b)| match (*a == token_id, *b == token_id) {
                (true, false) => Some(*b),
                (false, true) => Some(*a),
                _ => None,
            })
            .collect();
        friends.sort_unstable();
        friends
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_friendship_is_symmetric() {
        let friends = StaticFriendships::new();
        friends.add(2, 1);
        assert!(friends.is_friend(1, 2).await);
        assert!(friends.is_friend(2, 1).await);
        assert!(!friends.is_friend(1, 3).await);

        friends.add(1, 5);
        assert_eq!(friends.friends_of(1).await, vec![2, 5]);

        friends.remove(1, 2);
        assert!(!friends.is_friend(2, 1).await);
    }
}
