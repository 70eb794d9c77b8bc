//! End-to-end cashier scenarios against the in-memory store

use cashier_ledger::{
    ClientForm, ClientId, ClientRegistry, Config, Error, Export, ExportScope, Ledger,
    MemoryStore, MembershipTier, Operator, PaymentMethod, Role, TicketQuery, TicketRequest,
    TicketStore, TicketType, UserAdmin, WithdrawalPolicy, EMPTY_EXPORT,
};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

struct Cage {
    ledger: Ledger,
    store: Arc<MemoryStore>,
    client: ClientId,
}

async fn cage(store: MemoryStore, config: Config) -> Cage {
    let store = Arc::new(store);
    let registry = ClientRegistry::new(store.clone(), &config);
    let client = registry
        .create(
            &Operator::system(),
            ClientForm {
                name: "Ada Lovelace".to_string(),
                national_id: "12345678".to_string(),
                membership: MembershipTier::Vip,
                active: true,
            },
        )
        .await
        .unwrap();

    Cage {
        ledger: Ledger::new(store.clone(), config).unwrap(),
        store,
        client: client.id,
    }
}

fn config_with(policy: WithdrawalPolicy) -> Config {
    let mut config = Config::default();
    config.withdrawals.policy = policy;
    config.report.utc_offset_minutes = Some(0);
    config
}

#[tokio::test]
async fn scenario_1_balance_folds_history() {
    let cage = cage(MemoryStore::new(), Config::default()).await;
    let op = Operator::system();

    cage.ledger.deposit(&op, cage.client, dec!(100), PaymentMethod::Cash).await.unwrap();
    cage.ledger.deposit(&op, cage.client, dec!(50), PaymentMethod::Card).await.unwrap();
    cage.ledger.withdraw(&op, cage.client, dec!(30), PaymentMethod::Cash).await.unwrap();

    assert_eq!(cage.ledger.get_balance(cage.client).await.unwrap(), dec!(120));
}

#[tokio::test]
async fn scenario_2_no_tickets_no_withdrawal() {
    let cage = cage(MemoryStore::new(), Config::default()).await;

    assert_eq!(cage.ledger.get_balance(cage.client).await.unwrap(), dec!(0));
    assert!(!cage.ledger.can_withdraw(cage.client, dec!(0.01)).await.unwrap());

    let err = cage
        .ledger
        .withdraw(&Operator::system(), cage.client, dec!(10), PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));
}

#[tokio::test]
async fn scenario_3_withdraw_entire_balance() {
    let cage = cage(MemoryStore::new(), Config::default()).await;
    let op = Operator::system();
    cage.ledger.deposit(&op, cage.client, dec!(100), PaymentMethod::Cash).await.unwrap();

    assert!(cage.ledger.can_withdraw(cage.client, dec!(100)).await.unwrap());
    cage.ledger.withdraw(&op, cage.client, dec!(100), PaymentMethod::Cash).await.unwrap();
    assert_eq!(cage.ledger.get_balance(cage.client).await.unwrap(), dec!(0));
}

#[tokio::test]
async fn scenario_4_one_cent_over_is_rejected() {
    let cage = cage(MemoryStore::new(), Config::default()).await;
    let op = Operator::system();
    cage.ledger.deposit(&op, cage.client, dec!(100), PaymentMethod::Cash).await.unwrap();

    let err = cage
        .ledger
        .withdraw(&op, cage.client, dec!(100.01), PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientBalance { requested, available }
            if requested == dec!(100.01) && available == dec!(100)
    ));

    assert_eq!(cage.store.list_tickets().await.unwrap().len(), 1);
    assert_eq!(
        cage.ledger
            .metrics()
            .withdrawals_rejected
            .with_label_values(&["insufficient_balance"])
            .get(),
        1
    );
}

async fn race_two_withdrawals(policy: WithdrawalPolicy) -> (Cage, usize) {
    // Latency makes both balance reads land before either insert
    let store = MemoryStore::new().with_latency(Duration::from_millis(20));
    let cage = cage(store, config_with(policy)).await;
    let op = Operator::system();
    cage.ledger.deposit(&op, cage.client, dec!(100), PaymentMethod::Cash).await.unwrap();

    let (first, second) = tokio::join!(
        cage.ledger.withdraw(&op, cage.client, dec!(60), PaymentMethod::Cash),
        cage.ledger.withdraw(&op, cage.client, dec!(60), PaymentMethod::Cash),
    );
    let accepted = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    (cage, accepted)
}

#[tokio::test]
async fn scenario_5_advisory_policy_keeps_the_race() {
    let (cage, accepted) = race_two_withdrawals(WithdrawalPolicy::Advisory).await;

    assert_eq!(accepted, 2);
    assert_eq!(cage.ledger.get_balance(cage.client).await.unwrap(), dec!(-20));
}

#[tokio::test]
async fn scenario_5_serialized_policy_rejects_second_withdrawal() {
    let (cage, accepted) = race_two_withdrawals(WithdrawalPolicy::Serialized).await;

    assert_eq!(accepted, 1);
    assert_eq!(cage.ledger.get_balance(cage.client).await.unwrap(), dec!(40));
}

#[tokio::test]
async fn scenario_6_empty_export_returns_sentinel() {
    let cage = cage(MemoryStore::new(), config_with(WithdrawalPolicy::Serialized)).await;

    let export = cage
        .ledger
        .export_tickets(&Operator::system(), ExportScope::All)
        .await
        .unwrap();
    assert_eq!(export, Export::Empty);
    assert_eq!(export.to_string(), EMPTY_EXPORT);
}

#[tokio::test]
async fn test_export_resolves_names_and_degrades() {
    let config = config_with(WithdrawalPolicy::Serialized);
    let cage = cage(MemoryStore::new(), config.clone()).await;
    let users = UserAdmin::new(cage.store.clone(), &config);

    let cashier_user = users
        .create(&Operator::system(), "cage1", Role::Cashier, true)
        .await
        .unwrap();
    let gone_user = users
        .create(&Operator::system(), "gone", Role::Cashier, true)
        .await
        .unwrap();
    let cashier = Operator::new(cashier_user.id, Role::Cashier);
    let gone = Operator::new(gone_user.id, Role::Cashier);

    cage.ledger.deposit(&cashier, cage.client, dec!(10), PaymentMethod::Cash).await.unwrap();
    cage.ledger.deposit(&gone, cage.client, dec!(20), PaymentMethod::Card).await.unwrap();
    cage.ledger
        .deposit(&Operator::system(), cage.client, dec!(30), PaymentMethod::BankTransfer)
        .await
        .unwrap();
    users.delete(&Operator::system(), gone_user.id).await.unwrap();

    let export = cage
        .ledger
        .export_tickets(&Operator::system(), ExportScope::All)
        .await
        .unwrap();
    assert_eq!(export.rows(), 3);

    let text = export.as_text();
    assert!(text.contains(r#""Ada Lovelace","Deposit","Cash","10.00","cage1""#));
    assert!(text.contains(r#""Ada Lovelace","Deposit","Card","20.00","System""#));
    assert!(text.contains(r#""Ada Lovelace","Deposit","Bank transfer","30.00","System""#));
}

#[tokio::test]
async fn test_daily_export_permission_and_scope() {
    let cage = cage(MemoryStore::new(), config_with(WithdrawalPolicy::Serialized)).await;
    let admin = Operator::system();

    cage.ledger
        .create_ticket(
            &admin,
            TicketRequest {
                client_id: cage.client,
                ticket_type: TicketType::Deposit,
                amount: dec!(75),
                payment_method: PaymentMethod::Cash,
                timestamp: Some(Utc::now() - ChronoDuration::days(3)),
            },
        )
        .await
        .unwrap();
    cage.ledger.deposit(&admin, cage.client, dec!(5), PaymentMethod::Cash).await.unwrap();

    let cashier = Operator::new(cashier_ledger::UserId::new(), Role::Cashier);
    assert!(matches!(
        cage.ledger.export_tickets(&cashier, ExportScope::All).await,
        Err(Error::PermissionDenied { .. })
    ));

    let today = cage
        .ledger
        .export_tickets(&cashier, ExportScope::Today)
        .await
        .unwrap();
    assert_eq!(today.rows(), 1);
    assert!(today.as_text().contains(r#""5.00""#));

    let all = cage
        .ledger
        .export_tickets(&admin, ExportScope::All)
        .await
        .unwrap();
    assert_eq!(all.rows(), 2);
}

#[tokio::test]
async fn test_search_and_dashboard() {
    let cage = cage(MemoryStore::new(), config_with(WithdrawalPolicy::Serialized)).await;
    let op = Operator::system();
    cage.ledger.deposit(&op, cage.client, dec!(200), PaymentMethod::Cash).await.unwrap();
    cage.ledger.withdraw(&op, cage.client, dec!(50), PaymentMethod::Cash).await.unwrap();

    let withdrawals = cage
        .ledger
        .search_tickets(&TicketQuery::new().of_type(TicketType::Withdrawal).search("lovelace"))
        .await
        .unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].amount, dec!(50));

    let dashboard = cage.ledger.dashboard(&op).await.unwrap();
    assert_eq!(dashboard.client_count, 1);
    assert_eq!(dashboard.ticket_count, 2);
    assert_eq!(dashboard.total_balance, dec!(150));
    assert_eq!(dashboard.average_balance, dec!(150));
    let today = dashboard.activity.last().unwrap();
    assert_eq!(today.deposits, dec!(200));
    assert_eq!(today.withdrawals, dec!(50));
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let mut config = Config::default();
    config.store.request_timeout_ms = 10;
    let ledger = Ledger::new(
        Arc::new(MemoryStore::new().with_latency(Duration::from_millis(200))),
        config,
    )
    .unwrap();

    let err = ledger
        .deposit(&Operator::system(), ClientId(1), dec!(10), PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
}
