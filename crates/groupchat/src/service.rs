//! Chat operations composed from the router, the writer and the event fan-out.
//!
//! Every mutation validates its input, encodes the new entities, and commits
//! them through the [`TransactionalWriter`]. Reads go through the
//! [`QueryRouter`]. Store faults reach callers already classified as
//! [`ChatError`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use groupchat_core::chat::{
    validate_group, validate_id, validate_message, validate_user, AddUserToGroupRequest,
    CreateGroupRequest, CreateUserAccountRequest, Group, Membership, Message, PageQuery,
    SendMessageRequest, TypingIndicatorRequest, User, UserGroup,
};
use groupchat_core::events::{ChatEvent, ChatPubSub};
use groupchat_core::storage::{
    keys, AccessPattern, ChatError, Entity, Item, ItemStore, Page, PrimaryKey, QueryRouter,
    Result, RetryPolicy, TransactionalWriter, WriteOperation,
};

/// Attempts at creating a group before an id collision surfaces as a conflict.
const CREATE_GROUP_ATTEMPTS: usize = 3;

/// The chat backend's operations.
#[derive(Clone)]
pub struct ChatService {
    router: QueryRouter,
    writer: TransactionalWriter,
    pubsub: Arc<dyn ChatPubSub>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ItemStore>,
        pubsub: Arc<dyn ChatPubSub>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            router: QueryRouter::new(store.clone(), retry),
            writer: TransactionalWriter::new(store, retry),
            pubsub,
        }
    }

    /// Overrides the default and maximum page sizes of paginated reads.
    pub fn with_page_sizes(mut self, default_page_size: usize, max_page_size: usize) -> Self {
        self.router = self
            .router
            .with_page_sizes(default_page_size, max_page_size);
        self
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Registers a user account. An existing account with the same id is a
    /// conflict, never overwritten.
    pub async fn create_user_account(&self, request: CreateUserAccountRequest) -> Result<User> {
        let mut user = User::new(request.id, request.username, request.email);
        user.profile_picture = request.profile_picture;
        validate_user(&user)?;

        match self
            .writer
            .write(vec![WriteOperation::put_new(user.to_item()?)])
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = %user.id, username = %user.username, "Created user account");
                Ok(user)
            }
            Err(ChatError::TransactionFailed(failure)) if failure.condition_failed_at(0) => {
                Err(ChatError::Conflict(format!(
                    "User already exists: {}",
                    user.id
                )))
            }
            Err(err) => Err(err),
        }
    }

    /// Point lookup of a user (`Message.user`).
    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        validate_id("userId", user_id)?;
        let key = PrimaryKey::new(keys::user_pk(user_id), keys::user_sk(user_id));
        self.router
            .get::<User>(&key)
            .await?
            .ok_or_else(|| ChatError::NotFound {
                entity_type: "User",
                id: user_id.to_string(),
            })
    }

    // ========================================================================
    // Groups
    // ========================================================================

    /// Point lookup of a group (`UserGroup.group`).
    pub async fn get_group(&self, group_id: &str) -> Result<Group> {
        validate_id("groupId", group_id)?;
        self.router
            .get::<Group>(&group_key(group_id))
            .await?
            .ok_or_else(|| ChatError::NotFound {
                entity_type: "Group",
                id: group_id.to_string(),
            })
    }

    /// Creates a group together with its owner's membership.
    ///
    /// Both rows are committed in one transaction guarded by "neither key
    /// exists". A collision on the minted id retries with a fresh one.
    pub async fn create_group(&self, request: CreateGroupRequest) -> Result<Group> {
        let mut group = Group::new(request.creator_id, request.name.trim());
        validate_group(&group)?;

        for attempt in 1..=CREATE_GROUP_ATTEMPTS {
            let owner = Membership::owner(&group);
            let operations = vec![
                WriteOperation::put_new(group.to_item()?),
                WriteOperation::put_new(owner.to_item()?),
            ];

            match self.writer.write(operations).await {
                Ok(()) => {
                    tracing::info!(
                        group_id = %group.id,
                        creator_id = %group.creator_id,
                        name = %group.name,
                        "Created group"
                    );
                    return Ok(group);
                }
                Err(ChatError::TransactionFailed(failure)) if failure.is_conflict() => {
                    tracing::warn!(
                        group_id = %group.id,
                        attempt,
                        %failure,
                        "Group id collision, retrying with a fresh id"
                    );
                    group = group.reminted();
                }
                Err(err) => return Err(err),
            }
        }

        Err(ChatError::Conflict(format!(
            "Group id collided on {CREATE_GROUP_ATTEMPTS} attempts"
        )))
    }

    /// Adds a user to an existing group.
    ///
    /// The group's existence is checked in the same transaction as the
    /// guarded membership put, so a missing group and an existing membership
    /// are told apart by position.
    pub async fn add_user_to_group(
        &self,
        group_id: &str,
        request: AddUserToGroupRequest,
    ) -> Result<Membership> {
        validate_id("groupId", group_id)?;
        validate_id("userId", &request.user_id)?;

        let membership = Membership::member(group_id, request.user_id);
        let operations = vec![
            WriteOperation::require_exists(group_key(group_id)),
            WriteOperation::put_new(membership.to_item()?),
        ];

        match self.writer.write(operations).await {
            Ok(()) => {
                tracing::info!(
                    group_id = %membership.group_id,
                    user_id = %membership.user_id,
                    "Added user to group"
                );
                Ok(membership)
            }
            Err(ChatError::TransactionFailed(failure)) if failure.condition_failed_at(0) => {
                Err(ChatError::NotFound {
                    entity_type: "Group",
                    id: membership.group_id,
                })
            }
            Err(ChatError::TransactionFailed(failure)) if failure.condition_failed_at(1) => {
                Err(ChatError::Conflict(format!(
                    "User {} is already a member of group {}",
                    membership.user_id, membership.group_id
                )))
            }
            Err(err) => Err(err),
        }
    }

    /// Groups created by a user, oldest first.
    pub async fn groups_created_by_user(
        &self,
        user_id: &str,
        page: &PageQuery,
    ) -> Result<Page<Group>> {
        self.router
            .query_as::<Group>(
                AccessPattern::GroupsCreatedByUser,
                user_id,
                page.cursor.as_deref(),
                page.limit,
            )
            .await
    }

    /// Groups a user belongs to in join order, each with its group resolved
    /// by one batched read per page.
    pub async fn groups_user_belongs_to(
        &self,
        user_id: &str,
        page: &PageQuery,
    ) -> Result<Page<UserGroup>> {
        let memberships = self
            .router
            .query_as::<Membership>(
                AccessPattern::GroupsUserBelongsTo,
                user_id,
                page.cursor.as_deref(),
                page.limit,
            )
            .await?;

        let group_keys: Vec<PrimaryKey> = memberships
            .items
            .iter()
            .map(|membership| group_key(&membership.group_id))
            .collect();
        let groups: HashMap<String, Group> = self
            .router
            .batch_get::<Group>(&group_keys)
            .await?
            .into_iter()
            .map(|group| (group.id.clone(), group))
            .collect();

        Ok(memberships.map(|membership| {
            let group = groups.get(&membership.group_id).cloned();
            if group.is_none() {
                tracing::warn!(
                    group_id = %membership.group_id,
                    user_id = %membership.user_id,
                    "Membership refers to a missing group"
                );
            }
            UserGroup { membership, group }
        }))
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Posts a message to an existing group and notifies its subscribers.
    pub async fn send_message(
        &self,
        group_id: &str,
        request: SendMessageRequest,
    ) -> Result<Message> {
        let message = Message::new(group_id, request.sender_id, request.text);
        validate_message(&message)?;
        self.get_group(group_id).await?;

        self.writer
            .write(vec![WriteOperation::put(message.to_item()?)])
            .await?;

        tracing::info!(
            group_id = %message.group_id,
            message_id = %message.id,
            sender_id = %message.sender_id,
            "Message sent"
        );

        self.notify(ChatEvent::message_sent(message.clone())).await;
        Ok(message)
    }

    /// Messages of a group, oldest first.
    pub async fn messages_per_group(
        &self,
        group_id: &str,
        page: &PageQuery,
    ) -> Result<Page<Message>> {
        self.router
            .query_as::<Message>(
                AccessPattern::MessagesPerGroup,
                group_id,
                page.cursor.as_deref(),
                page.limit,
            )
            .await
    }

    // ========================================================================
    // Notifications and raw access
    // ========================================================================

    /// Forwards a typing notification to the group's subscribers. Nothing is
    /// stored.
    pub async fn typing_indicator(
        &self,
        group_id: &str,
        request: TypingIndicatorRequest,
    ) -> Result<ChatEvent> {
        validate_id("groupId", group_id)?;
        validate_id("userId", &request.user_id)?;

        let event = ChatEvent::typing(group_id, request.user_id, request.typing);
        self.notify(event.clone()).await;
        Ok(event)
    }

    /// Subscribes to the events of an existing group.
    pub async fn subscribe(&self, group_id: &str) -> Result<broadcast::Receiver<ChatEvent>> {
        self.get_group(group_id).await?;
        self.pubsub
            .subscribe(group_id)
            .await
            .map_err(|err| ChatError::Unknown(err.to_string()))
    }

    /// Runs an access pattern by name and returns the raw stored items.
    pub async fn query_pattern(
        &self,
        pattern: &str,
        id: &str,
        page: &PageQuery,
    ) -> Result<Page<Item>> {
        self.router
            .query(pattern, id, page.cursor.as_deref(), page.limit)
            .await
    }

    /// Publishes an event. Delivery failures never fail the mutation.
    async fn notify(&self, event: ChatEvent) {
        if let Err(err) = self.pubsub.publish(event.group_id(), &event).await {
            tracing::warn!(
                group_id = %event.group_id(),
                event_type = event.event_type(),
                error = %err,
                "Failed to publish chat event"
            );
        }
    }
}

fn group_key(group_id: &str) -> PrimaryKey {
    PrimaryKey::new(keys::group_pk(group_id), keys::group_sk(group_id))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use groupchat_core::storage::{OperationOutcome, StoreError, TransactionFailure};

    use super::*;
    use crate::pubsub::MemoryPubSub;
    use crate::storage::inmemory::{Fault, InMemoryStore};

    fn service_with(store: InMemoryStore) -> ChatService {
        ChatService::new(
            Arc::new(store),
            Arc::new(MemoryPubSub::new()),
            RetryPolicy {
                max_retries: 2,
                min_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                jitter: false,
            },
        )
    }

    fn create_group_request(creator_id: &str, name: &str) -> CreateGroupRequest {
        CreateGroupRequest {
            creator_id: creator_id.to_string(),
            name: name.to_string(),
        }
    }

    fn add_user(user_id: &str) -> AddUserToGroupRequest {
        AddUserToGroupRequest {
            user_id: user_id.to_string(),
        }
    }

    fn send(sender_id: &str, text: &str) -> SendMessageRequest {
        SendMessageRequest {
            sender_id: sender_id.to_string(),
            text: text.to_string(),
        }
    }

    fn id_collision() -> Fault {
        Fault::Fail(StoreError::TransactionCanceled(TransactionFailure::new(vec![
            OperationOutcome::ConditionFailed,
            OperationOutcome::NoIssue,
        ])))
    }

    #[tokio::test]
    async fn test_group_chat_scenario() {
        let service = service_with(InMemoryStore::new());

        let group = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap();
        assert_eq!(group.creator_id, "U1");
        assert_eq!(group.name, "Team");

        let membership = service
            .add_user_to_group(&group.id, add_user("U2"))
            .await
            .unwrap();
        assert_eq!(membership.group_id, group.id);
        assert_eq!(membership.user_id, "U2");

        service
            .send_message(&group.id, send("U2", "hi"))
            .await
            .unwrap();

        let messages = service
            .messages_per_group(&group.id, &PageQuery::default())
            .await
            .unwrap();
        assert_eq!(messages.items.len(), 1);
        assert_eq!(messages.items[0].sender_id, "U2");
        assert_eq!(messages.items[0].text, "hi");
        assert_eq!(messages.cursor, None);

        let err = service
            .add_user_to_group(&group.id, add_user("U2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_group_writes_group_and_owner() {
        let store = InMemoryStore::new();
        let service = service_with(store.clone());

        let group = service
            .create_group(create_group_request("U1", "  Team  "))
            .await
            .unwrap();

        assert_eq!(group.name, "Team");
        assert_eq!(store.len().await, 2);
        assert_eq!(service.get_group(&group.id).await.unwrap(), group);

        let belongs = service
            .groups_user_belongs_to("U1", &PageQuery::default())
            .await
            .unwrap();
        assert_eq!(belongs.items.len(), 1);
        assert_eq!(belongs.items[0].membership.role.as_str(), "owner");
        assert_eq!(belongs.items[0].group.as_ref(), Some(&group));
    }

    #[tokio::test]
    async fn test_create_group_retries_id_collision() {
        let store = InMemoryStore::new();
        store.inject_fault(id_collision()).await;
        let service = service_with(store.clone());

        let group = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        assert!(service.get_group(&group.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_group_persistent_collision_is_conflict() {
        let store = InMemoryStore::new();
        for _ in 0..CREATE_GROUP_ATTEMPTS {
            store.inject_fault(id_collision()).await;
        }
        let service = service_with(store.clone());

        let err = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Conflict(_)));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_create_group_owner_conflict_leaves_no_group_row() {
        let store = InMemoryStore::new();
        // The group put passes its precondition; only the owner membership fails.
        for _ in 0..CREATE_GROUP_ATTEMPTS {
            store.inject_fault(Fault::ConditionFailedAt(1)).await;
        }
        let service = service_with(store.clone());

        let err = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Conflict(_)));
        assert_eq!(store.len().await, 0);
        let created = service
            .groups_created_by_user("U1", &PageQuery::default())
            .await
            .unwrap();
        assert!(created.items.is_empty());
    }

    #[tokio::test]
    async fn test_create_group_rejects_blank_name() {
        let store = InMemoryStore::new();
        let service = service_with(store.clone());

        let err = service
            .create_group(create_group_request("U1", "   "))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_add_user_to_missing_group_is_not_found() {
        let store = InMemoryStore::new();
        let service = service_with(store.clone());

        let err = service
            .add_user_to_group("missing", add_user("U2"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ChatError::NotFound {
                entity_type: "Group",
                id: "missing".to_string()
            }
        );
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_membership_leaves_row_unchanged() {
        let store = InMemoryStore::new();
        let service = service_with(store.clone());
        let group = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap();
        service
            .add_user_to_group(&group.id, add_user("U2"))
            .await
            .unwrap();
        let before = store.items().await;

        let err = service
            .add_user_to_group(&group.id, add_user("U2"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Conflict(_)));
        assert_eq!(store.items().await, before);
    }

    #[tokio::test]
    async fn test_concurrent_joins_have_one_winner() {
        let service = service_with(InMemoryStore::new());
        let group = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            service.add_user_to_group(&group.id, add_user("U2")),
            service.add_user_to_group(&group.id, add_user("U2")),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(ChatError::Conflict(_)))));
    }

    #[tokio::test]
    async fn test_groups_user_belongs_to_in_join_order() {
        let service = service_with(InMemoryStore::new());
        let mut expected = Vec::new();
        for name in ["First", "Second", "Third"] {
            let group = service
                .create_group(create_group_request("owner", name))
                .await
                .unwrap();
            expected.push(group.id);
        }
        // Join in reverse creation order.
        for group_id in expected.iter().rev() {
            tokio::time::sleep(Duration::from_millis(2)).await;
            service
                .add_user_to_group(group_id, add_user("U2"))
                .await
                .unwrap();
        }

        let page = service
            .groups_user_belongs_to("U2", &PageQuery::default())
            .await
            .unwrap();

        let joined: Vec<String> = page
            .items
            .iter()
            .map(|user_group| user_group.membership.group_id.clone())
            .collect();
        expected.reverse();
        assert_eq!(joined, expected);
        assert!(page.items.iter().all(|user_group| user_group.group.is_some()));
    }

    #[tokio::test]
    async fn test_groups_created_by_user() {
        let service = service_with(InMemoryStore::new());
        let first = service
            .create_group(create_group_request("U1", "First"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = service
            .create_group(create_group_request("U1", "Second"))
            .await
            .unwrap();
        service
            .create_group(create_group_request("U9", "Other"))
            .await
            .unwrap();

        let page = service
            .groups_created_by_user("U1", &PageQuery::default())
            .await
            .unwrap();

        assert_eq!(page.items, vec![first, second]);
    }

    #[tokio::test]
    async fn test_messages_page_without_gaps() {
        let service = service_with(InMemoryStore::new());
        let group = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap();
        let mut sent = Vec::new();
        for i in 0..5 {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let message = service
                .send_message(&group.id, send("U1", &format!("message {i}")))
                .await
                .unwrap();
            sent.push(message.id);
        }

        let mut read = Vec::new();
        let mut page_sizes = Vec::new();
        let mut query = PageQuery {
            cursor: None,
            limit: Some(2),
        };
        loop {
            let page = service
                .messages_per_group(&group.id, &query)
                .await
                .unwrap();
            page_sizes.push(page.items.len());
            read.extend(page.items.into_iter().map(|message| message.id));
            match page.cursor {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }

        assert_eq!(page_sizes, vec![2, 2, 1]);
        assert_eq!(read, sent);
    }

    #[tokio::test]
    async fn test_send_message_to_missing_group() {
        let store = InMemoryStore::new();
        let service = service_with(store.clone());

        let err = service
            .send_message("missing", send("U1", "hi"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "NotFoundError");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_send_message_notifies_subscribers() {
        let service = service_with(InMemoryStore::new());
        let group = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap();
        let mut receiver = service.subscribe(&group.id).await.unwrap();

        let message = service
            .send_message(&group.id, send("U1", "hi"))
            .await
            .unwrap();

        assert_eq!(receiver.recv().await.unwrap(), ChatEvent::message_sent(message));
    }

    #[tokio::test]
    async fn test_typing_indicator_persists_nothing() {
        let store = InMemoryStore::new();
        let service = service_with(store.clone());
        let group = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap();
        let mut receiver = service.subscribe(&group.id).await.unwrap();
        let stored = store.len().await;

        let event = service
            .typing_indicator(
                &group.id,
                TypingIndicatorRequest {
                    user_id: "U2".to_string(),
                    typing: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(receiver.recv().await.unwrap(), event);
        assert_eq!(store.len().await, stored);
    }

    #[tokio::test]
    async fn test_create_user_account_twice_is_conflict() {
        let service = service_with(InMemoryStore::new());
        let request = CreateUserAccountRequest {
            id: "U1".to_string(),
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            profile_picture: Some("https://example.com/ana.png".to_string()),
        };

        let user = service.create_user_account(request.clone()).await.unwrap();
        assert_eq!(service.get_user("U1").await.unwrap(), user);

        let err = service.create_user_account(request).await.unwrap_err();
        assert!(matches!(err, ChatError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unknown_pattern_and_empty_results() {
        let service = service_with(InMemoryStore::new());

        let err = service
            .query_pattern("allUsers", "U1", &PageQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");

        let page = service
            .query_pattern("groupsCreatedByUser", "U1", &PageQuery::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.cursor, None);
    }

    #[tokio::test]
    async fn test_transient_read_failures_are_retried() {
        let store = InMemoryStore::new();
        let service = service_with(store.clone());
        let group = service
            .create_group(create_group_request("U1", "Team"))
            .await
            .unwrap();
        store
            .inject_fault(Fault::Fail(StoreError::Transient("throttled".to_string())))
            .await;

        assert_eq!(service.get_group(&group.id).await.unwrap(), group);
    }
}
