//! Database entities
//!
//! Value structs mapped 1:1 onto the relational schema. Traversal between
//! entities is explicit via repository queries; no in-memory object graph.

mod conversation;
mod friend;
mod group;
mod message;
mod user;

pub use conversation::{Conversation, ConversationKind, ConversationParticipant};
pub use friend::{
    canonical_pair, FriendRequest, FriendRequestStatus, FriendRequestWithRequester, Friendship,
};
pub use group::{Group, GroupMember, GroupRole, JoinPolicy};
pub use message::{FileMetadata, Message, MessageKind};
pub use user::{User, UserBasicInfo};
