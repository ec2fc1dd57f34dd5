//! Rent, liquidation and bankruptcy through the service.

use std::sync::Arc;

use monopoly_economy::config::AppConfig;
use monopoly_economy::economy::{DevelopmentAction, Solvency};
use monopoly_economy::engine::EconomyService;
use monopoly_economy::repository::InMemoryTradeStore;
use monopoly_economy::types::*;

use crate::fixtures::*;

#[tokio::test]
async fn test_unpayable_rent_eliminates_to_landlord() {
    let table = make_table(
        &[human(1, 30), human(2, 1500)],
        &[(1, MEDITERRANEAN, 0), (1, BALTIC, 0), (2, PARK_PLACE, 0), (2, BOARDWALK, 0)],
    )
    .await;

    // Bare Boardwalk in a complete group charges double.
    let rent = table
        .service
        .charge_rent(table.game, PlayerId(1), BOARDWALK)
        .await
        .unwrap();
    assert_eq!(rent, 100);
    assert_eq!(table.balance(1).await, -70);
    let total_before: i64 = table.state().await.players().map(|p| p.balance).sum();

    let plan = table.service.plan_liquidation(table.game, PlayerId(1)).await.unwrap();
    assert!(!plan.is_covered());

    let report = table
        .service
        .resolve_bankruptcy(table.game, PlayerId(1), Some(BOARDWALK))
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        Solvency::Eliminated { creditor: Owner::Player(PlayerId(2)) }
    );
    assert_eq!(report.initial_shortfall, 70);
    // Mortgages raised 60, so 10 of the rent was never paid.
    assert_eq!(report.charged_to_creditor, 10);
    assert_eq!(report.written_off, 0);

    let state = table.state().await;
    let debtor = state.player(PlayerId(1)).unwrap();
    assert!(debtor.eliminated);
    assert_eq!(debtor.balance, 0);
    assert_eq!(state.turn_order(), vec![PlayerId(2)]);
    assert_eq!(state.player(PlayerId(2)).unwrap().balance, 1590);
    let total_after: i64 = state.players().map(|p| p.balance).sum();
    assert_eq!(total_after, total_before + 60);

    // The landlord takes the lots as they stand, mortgages included.
    for id in [MEDITERRANEAN, BALTIC] {
        let record = state.ownership(id).unwrap();
        assert_eq!(record.owner, Owner::Player(PlayerId(2)));
        assert!(record.mortgaged);
    }
}

#[tokio::test]
async fn test_deficit_recovered_by_selling_houses() {
    let table = make_table(
        &[human(1, 50), human(2, 1500)],
        &[(1, MEDITERRANEAN, 1), (1, BALTIC, 1), (2, PARK_PLACE, 0), (2, BOARDWALK, 0)],
    )
    .await;

    table
        .service
        .charge_rent(table.game, PlayerId(1), BOARDWALK)
        .await
        .unwrap();
    let plan = table.service.plan_liquidation(table.game, PlayerId(1)).await.unwrap();
    assert!(plan.is_covered());

    let report = table
        .service
        .resolve_bankruptcy(table.game, PlayerId(1), Some(BOARDWALK))
        .await
        .unwrap();
    assert_eq!(report.outcome, Solvency::Solvent);
    assert!(report.failures.is_empty());

    let state = table.state().await;
    assert!(state.player(PlayerId(1)).unwrap().balance >= 0);
    assert!(state.player(PlayerId(1)).unwrap().is_live());
    assert_eq!(state.holdings(PlayerId(1)), vec![MEDITERRANEAN, BALTIC]);
    let levels: Vec<u8> = state.group_levels("brown").into_iter().map(|(_, l)| l).collect();
    assert!(levels.iter().max().unwrap() - levels.iter().min().unwrap() <= 1);
}

#[tokio::test]
async fn test_bank_debt_returns_property_reset() {
    let table = make_table(
        &[human(1, 100), human(2, 1500)],
        &[(1, ORIENTAL, 0), (1, VERMONT, 0), (1, CONNECTICUT, 2)],
    )
    .await;

    table
        .service
        .persist(table.game, &[StateChange::Balance { player: PlayerId(1), delta: -900 }])
        .await
        .unwrap();

    let report = table
        .service
        .resolve_bankruptcy(table.game, PlayerId(1), None)
        .await
        .unwrap();
    assert_eq!(report.outcome, Solvency::Eliminated { creditor: Owner::Bank });
    assert!(report.is_eliminated());

    let state = table.state().await;
    for id in [ORIENTAL, VERMONT, CONNECTICUT] {
        assert_eq!(state.ownership(id).unwrap(), &PropertyOwnership::unowned(id));
    }
    assert_eq!(state.player(PlayerId(1)).unwrap().balance, 0);
    assert_eq!(state.player(PlayerId(2)).unwrap().balance, 1500);
}

#[tokio::test]
async fn test_solvent_player_is_left_alone() {
    let table = make_table(&[human(1, 500), human(2, 500)], &[(1, ORIENTAL, 0)]).await;
    let report = table
        .service
        .resolve_bankruptcy(table.game, PlayerId(1), None)
        .await
        .unwrap();
    assert_eq!(report.outcome, Solvency::Solvent);
    assert!(report.changes.is_empty());
    assert_eq!(table.owner(ORIENTAL).await, Owner::Player(PlayerId(1)));
}

#[tokio::test]
async fn test_store_failure_surfaces_and_recovers() {
    let state = make_state(
        &[human(1, 500), human(2, 500)],
        &[(1, MEDITERRANEAN, 0), (1, BALTIC, 0)],
    );
    let games = Arc::new(FlakyGameStore::new(&state).await);
    let service = EconomyService::new(
        state.board_handle(),
        AppConfig::default(),
        games.clone(),
        Arc::new(InMemoryTradeStore::new()),
    );

    games.set_error("disk full");
    let err = service
        .develop(state.game_id, PlayerId(1), DevelopmentAction::Build(MEDITERRANEAN))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("disk full"));
    assert_eq!(games.write_count(), 0);

    let snapshot = service.snapshot(state.game_id).await.unwrap();
    assert_eq!(snapshot.ownership(MEDITERRANEAN).unwrap().development, 0);
    assert_eq!(snapshot.player(PlayerId(1)).unwrap().balance, 500);

    games.clear_error();
    let outcome = service
        .develop(state.game_id, PlayerId(1), DevelopmentAction::Build(MEDITERRANEAN))
        .await
        .unwrap();
    assert!(outcome.is_applied());

    let snapshot = service.snapshot(state.game_id).await.unwrap();
    assert_eq!(snapshot.ownership(MEDITERRANEAN).unwrap().development, 1);
    assert_eq!(snapshot.player(PlayerId(1)).unwrap().balance, 450);
}
