mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use machine_inventory::{
    DeliveryTransport, Dispatcher, DispatcherConfig, InMemoryStore, InventoryError,
    InventoryService, Machine, MachineDraft, MachineId, MachineRecord, MachineStore, OwnerCode,
    RepeatPolicy, StoreError, ThresholdTrigger, ValidationError,
};

use common::RecordingSender;

struct Harness {
    service: InventoryService,
    dispatcher: Arc<Dispatcher>,
    sender: Arc<RecordingSender>,
}

impl Harness {
    fn new(store: Arc<dyn MachineStore>) -> Self {
        let sender = RecordingSender::succeeding();
        let dispatcher = Arc::new(Dispatcher::new(
            DispatcherConfig::default(),
            DeliveryTransport::new(sender.clone()),
        ));
        let service = InventoryService::new(store, dispatcher.clone());
        Self {
            service,
            dispatcher,
            sender,
        }
    }

    /// Drain the dispatcher and return the delivered messages.
    async fn delivered_messages(&self) -> Vec<String> {
        self.dispatcher.shutdown().await;
        self.sender.calls().into_iter().map(|n| n.message).collect()
    }
}

fn machine(n: u8, owner: &str) -> MachineDraft {
    MachineDraft::new(
        format!("00:1a:2b:3c:4d:{n:02x}"),
        format!("machine-{n}"),
        format!("10.0.0.{n}"),
    )
    .with_owner(owner)
}

#[tokio::test(start_paused = true)]
async fn test_third_and_fourth_machine_warn() {
    let h = Harness::new(Arc::new(InMemoryStore::new()));

    h.service.create_machine(machine(1, "abc")).await.unwrap();
    h.service.create_machine(machine(2, "abc")).await.unwrap();
    assert_eq!(h.dispatcher.stats().enqueued, 0);

    h.service.create_machine(machine(3, "abc")).await.unwrap();
    assert_eq!(h.dispatcher.stats().enqueued, 1);

    h.service.create_machine(machine(4, "abc")).await.unwrap();

    assert_eq!(
        h.delivered_messages().await,
        vec![
            "Employee abc has been assigned 3 computers",
            "Employee abc has been assigned 4 computers",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unassigned_machines_never_warn() {
    let h = Harness::new(Arc::new(InMemoryStore::new()));

    for n in 1..=4 {
        h.service.create_machine(machine(n, "")).await.unwrap();
    }

    assert!(h.delivered_messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reassignment_onto_loaded_owner_warns() {
    let h = Harness::new(Arc::new(InMemoryStore::new()));

    let moved = h.service.create_machine(machine(1, "aaa")).await.unwrap();
    h.service.create_machine(machine(2, "aaa")).await.unwrap();
    h.service.create_machine(machine(3, "bbb")).await.unwrap();
    h.service.create_machine(machine(4, "bbb")).await.unwrap();

    let updated = h
        .service
        .update_machine(moved.id, machine(1, "bbb"))
        .await
        .unwrap();
    assert_eq!(updated.owner, Some(OwnerCode::parse("bbb").unwrap()));

    h.dispatcher.shutdown().await;
    let calls = h.sender.calls();

    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].owner_code.as_str(), "bbb");
    assert_eq!(calls[0].message, "Employee bbb has been assigned 3 computers");
}

#[tokio::test(start_paused = true)]
async fn test_reassignment_below_threshold_is_quiet() {
    let h = Harness::new(Arc::new(InMemoryStore::new()));

    let moved = h.service.create_machine(machine(1, "aaa")).await.unwrap();
    h.service.create_machine(machine(2, "bbb")).await.unwrap();

    h.service.update_machine(moved.id, machine(1, "bbb")).await.unwrap();
    h.service.update_machine(moved.id, machine(1, "aaa")).await.unwrap();

    assert!(h.delivered_messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_without_owner_change_is_quiet() {
    let h = Harness::new(Arc::new(InMemoryStore::new()));

    let mut last = None;
    for n in 1..=3 {
        last = Some(h.service.create_machine(machine(n, "abc")).await.unwrap());
    }
    let last = last.unwrap();

    let renamed = machine(3, "abc").with_description("renamed");
    h.service.update_machine(last.id, renamed).await.unwrap();

    // Only the creation of the third machine warned.
    assert_eq!(h.delivered_messages().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_crossing_policy_suppresses_repeats() {
    let sender = RecordingSender::succeeding();
    let dispatcher = Arc::new(Dispatcher::new(
        DispatcherConfig::default(),
        DeliveryTransport::new(sender.clone()),
    ));
    let service = InventoryService::new(Arc::new(InMemoryStore::new()), dispatcher.clone())
        .with_trigger(ThresholdTrigger::default().with_repeat(RepeatPolicy::OnCrossing));

    for n in 1..=5 {
        service.create_machine(machine(n, "abc")).await.unwrap();
    }
    dispatcher.shutdown().await;

    assert_eq!(sender.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_validation_errors_surface_before_store() {
    let store = Arc::new(InMemoryStore::new());
    let h = Harness::new(store.clone());

    let err = h
        .service
        .create_machine(MachineDraft::new("00:1a", "x", "10.0.0.1"))
        .await
        .unwrap_err();
    assert_eq!(err, InventoryError::Validation(ValidationError::MacAddressLength));

    let err = h.service.create_machine(machine(1, "ABC")).await.unwrap_err();
    assert_eq!(err, InventoryError::Validation(ValidationError::OwnerCodeCase));

    let err = h.service.create_machine(machine(1, "abcd")).await.unwrap_err();
    assert_eq!(err, InventoryError::Validation(ValidationError::OwnerCodeLength));

    let err = h.service.machines_for_owner("Ab").await.unwrap_err();
    assert_matches!(err, InventoryError::Validation(_));

    let err = h.service.get_machine(MachineId(0)).await.unwrap_err();
    assert_eq!(err, InventoryError::Validation(ValidationError::InvalidId));

    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_update_for_missing_machine_is_a_validation_error() {
    let h = Harness::new(Arc::new(InMemoryStore::new()));

    let err = h
        .service
        .update_machine(MachineId(99), MachineDraft::new("short", "x", "10.0.0.1"))
        .await
        .unwrap_err();
    assert_eq!(err, InventoryError::Validation(ValidationError::MacAddressLength));

    let err = h
        .service
        .update_machine(MachineId(99), machine(9, "ABC"))
        .await
        .unwrap_err();
    assert_eq!(err, InventoryError::Validation(ValidationError::OwnerCodeCase));
}

#[tokio::test(start_paused = true)]
async fn test_crud_round() {
    let h = Harness::new(Arc::new(InMemoryStore::new()));

    let a = h.service.create_machine(machine(1, "abc")).await.unwrap();
    h.service.create_machine(machine(2, "xyz")).await.unwrap();

    assert_eq!(h.service.list_machines().await.unwrap().len(), 2);
    assert_eq!(h.service.get_machine(a.id).await.unwrap(), a);
    assert_eq!(h.service.machines_for_owner("abc").await.unwrap(), vec![a.clone()]);

    let dup = h.service.create_machine(machine(1, "xyz")).await.unwrap_err();
    assert_matches!(dup, InventoryError::Store(StoreError::Conflict(_)));

    h.service.delete_machine(a.id).await.unwrap();
    assert_eq!(
        h.service.get_machine(a.id).await.unwrap_err(),
        InventoryError::NotFound(a.id)
    );
    assert_eq!(
        h.service.delete_machine(a.id).await.unwrap_err(),
        InventoryError::NotFound(a.id)
    );
    assert_eq!(
        h.service.update_machine(MachineId(99), machine(9, "abc")).await.unwrap_err(),
        InventoryError::NotFound(MachineId(99))
    );
}

/// Store whose owner count can be switched to fail.
#[derive(Default)]
struct FlakyCountStore {
    inner: InMemoryStore,
    fail_counts: AtomicBool,
}

#[async_trait]
impl MachineStore for FlakyCountStore {
    async fn create(&self, record: MachineRecord) -> Result<Machine, StoreError> {
        self.inner.create(record).await
    }

    async fn list(&self) -> Result<Vec<Machine>, StoreError> {
        self.inner.list().await
    }

    async fn get(&self, id: MachineId) -> Result<Machine, StoreError> {
        self.inner.get(id).await
    }

    async fn by_owner(&self, owner: &OwnerCode) -> Result<Vec<Machine>, StoreError> {
        self.inner.by_owner(owner).await
    }

    async fn count_by_owner(&self, owner: &OwnerCode) -> Result<u64, StoreError> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("count unavailable".to_string()));
        }
        self.inner.count_by_owner(owner).await
    }

    async fn update(&self, id: MachineId, record: MachineRecord) -> Result<Machine, StoreError> {
        self.inner.update(id, record).await
    }

    async fn delete(&self, id: MachineId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_count_keeps_update_and_skips_warning() {
    let store = Arc::new(FlakyCountStore::default());
    let h = Harness::new(store.clone());

    let moved = h.service.create_machine(machine(1, "aaa")).await.unwrap();
    h.service.create_machine(machine(2, "bbb")).await.unwrap();
    h.service.create_machine(machine(3, "bbb")).await.unwrap();

    store.fail_counts.store(true, Ordering::SeqCst);

    let updated = h
        .service
        .update_machine(moved.id, machine(1, "bbb"))
        .await
        .unwrap();
    assert_eq!(updated.owner.as_ref().map(OwnerCode::as_str), Some("bbb"));

    // Creation needs the count up front and fails without storing anything.
    let err = h.service.create_machine(machine(4, "bbb")).await.unwrap_err();
    assert_matches!(err, InventoryError::Store(StoreError::Backend(_)));
    assert_eq!(store.list().await.unwrap().len(), 3);

    assert!(h.delivered_messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_delivery_is_invisible_to_caller() {
    let sender = RecordingSender::always_failing();
    let dispatcher = Arc::new(Dispatcher::new(
        DispatcherConfig::default(),
        DeliveryTransport::new(sender.clone()),
    ));
    let service = InventoryService::new(Arc::new(InMemoryStore::new()), dispatcher.clone());

    for n in 1..=3 {
        assert!(service.create_machine(machine(n, "abc")).await.is_ok());
    }
    dispatcher.shutdown().await;

    assert_eq!(sender.attempts(), 3);
    assert_eq!(dispatcher.stats().exhausted, 1);
}
