//! Trade negotiation through the service and in-memory stores.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use monopoly_economy::config::AppConfig;
use monopoly_economy::engine::{EconomyService, TradeResponse};
use monopoly_economy::repository::{InMemoryTradeStore, TradeRepository};
use monopoly_economy::trade::Verdict;
use monopoly_economy::types::*;

use crate::fixtures::*;

fn make_terms(offered: &[PropertyId], offered_cash: i64, requested: &[PropertyId], requested_cash: i64) -> TradeTerms {
    TradeTerms {
        offered_properties: offered.iter().copied().collect(),
        offered_cash,
        requested_properties: requested.iter().copied().collect(),
        requested_cash,
    }
}

fn economy_error(err: &anyhow::Error) -> &EconomyError {
    err.downcast_ref::<EconomyError>()
        .unwrap_or_else(|| panic!("not an economy error: {err:#}"))
}

#[tokio::test]
async fn test_accepted_swap_is_persisted() {
    let table = make_table(
        &[human(1, 1500), human(2, 1500)],
        &[(1, MEDITERRANEAN, 0), (2, ORIENTAL, 0)],
    )
    .await;

    let trade = assert_ok!(
        table
            .service
            .propose_trade(table.game, PlayerId(1), PlayerId(2), make_terms(&[MEDITERRANEAN], 100, &[ORIENTAL], 0))
            .await
    );
    assert_eq!(trade.status, TradeStatus::Pending);

    let trade = assert_ok!(
        table
            .service
            .respond_to_trade(trade.id, PlayerId(2), TradeResponse::Accept)
            .await
    );
    assert_eq!(trade.status, TradeStatus::Accepted);

    assert_eq!(table.balance(1).await, 1400);
    assert_eq!(table.balance(2).await, 1600);
    assert_eq!(table.owner(MEDITERRANEAN).await, Owner::Player(PlayerId(2)));
    assert_eq!(table.owner(ORIENTAL).await, Owner::Player(PlayerId(1)));

    let stored = table.trades.get_trade(trade.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TradeStatus::Accepted);
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn test_store_outage_mid_accept_leaves_no_partial_swap() {
    let state = make_state(
        &[human(1, 1500), human(2, 1500)],
        &[(1, MEDITERRANEAN, 0), (2, ORIENTAL, 0)],
    );
    let games = Arc::new(FlakyGameStore::new(&state).await);
    let trades = Arc::new(InMemoryTradeStore::new());
    let service = EconomyService::new(state.board_handle(), AppConfig::default(), games.clone(), trades.clone());
    let game = state.game_id;

    let trade = assert_ok!(
        service
            .propose_trade(game, PlayerId(1), PlayerId(2), make_terms(&[MEDITERRANEAN], 100, &[ORIENTAL], 0))
            .await
    );

    // Room for one change, the swap needs four.
    games.fail_after(1);
    let err = assert_err!(service.respond_to_trade(trade.id, PlayerId(2), TradeResponse::Accept).await);
    assert!(format!("{err:#}").contains("store unavailable"));
    assert_eq!(games.write_count(), 0);

    let snapshot = service.snapshot(game).await.unwrap();
    assert_eq!(snapshot.ownership(MEDITERRANEAN).unwrap().owner, Owner::Player(PlayerId(1)));
    assert_eq!(snapshot.ownership(ORIENTAL).unwrap().owner, Owner::Player(PlayerId(2)));
    assert_eq!(snapshot.player(PlayerId(1)).unwrap().balance, 1500);
    assert_eq!(snapshot.player(PlayerId(2)).unwrap().balance, 1500);

    // The trade is open again, under a fresh version.
    let stored = trades.get_trade(trade.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TradeStatus::Pending);
    assert_eq!(stored.version, 3);
}

#[tokio::test]
async fn test_counter_then_original_proposer_accepts() {
    let table = make_table(&[human(1, 1500), human(2, 1500)], &[(2, ORIENTAL, 0)]).await;

    let trade = table
        .service
        .propose_trade(table.game, PlayerId(1), PlayerId(2), make_terms(&[], 50, &[ORIENTAL], 0))
        .await
        .unwrap();

    // P2 asks for more: written from P2's side now.
    let counter = make_terms(&[ORIENTAL], 0, &[], 120);
    let trade = table
        .service
        .respond_to_trade(trade.id, PlayerId(2), TradeResponse::Counter(Some(counter)))
        .await
        .unwrap();
    assert_eq!(trade.status, TradeStatus::Countered);
    assert_eq!(trade.proposer, PlayerId(2));
    assert_eq!(trade.target, PlayerId(1));
    assert_eq!(trade.counter_count, 1);

    let err = assert_err!(
        table
            .service
            .respond_to_trade(trade.id, PlayerId(2), TradeResponse::Accept)
            .await
    );
    assert!(matches!(economy_error(&err), EconomyError::UnauthorizedActor { .. }));

    let trade = table
        .service
        .respond_to_trade(trade.id, PlayerId(1), TradeResponse::Accept)
        .await
        .unwrap();
    assert_eq!(trade.status, TradeStatus::Accepted);
    assert_eq!(trade.version, 3);
    assert_eq!(table.balance(1).await, 1380);
    assert_eq!(table.balance(2).await, 1620);
    assert_eq!(table.owner(ORIENTAL).await, Owner::Player(PlayerId(1)));
}

#[tokio::test]
async fn test_accept_after_property_left_reverts_to_pending() {
    let table = make_table(
        &[human(1, 1500), human(2, 1500), human(3, 1500)],
        &[(2, ORIENTAL, 0)],
    )
    .await;

    let stale = table
        .service
        .propose_trade(table.game, PlayerId(1), PlayerId(2), make_terms(&[], 200, &[ORIENTAL], 0))
        .await
        .unwrap();
    let sold = table
        .service
        .propose_trade(table.game, PlayerId(3), PlayerId(2), make_terms(&[], 150, &[ORIENTAL], 0))
        .await
        .unwrap();
    table
        .service
        .respond_to_trade(sold.id, PlayerId(2), TradeResponse::Accept)
        .await
        .unwrap();

    let err = table
        .service
        .respond_to_trade(stale.id, PlayerId(2), TradeResponse::Accept)
        .await
        .unwrap_err();
    assert!(matches!(economy_error(&err), EconomyError::TradeInfeasible(_)));

    let stored = table.trades.get_trade(stale.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TradeStatus::Pending);
    assert_eq!(stored.version, 2);
    assert_eq!(table.balance(1).await, 1500);
    assert_eq!(table.balance(2).await, 1650);
    assert_eq!(table.owner(ORIENTAL).await, Owner::Player(PlayerId(3)));
}

#[tokio::test]
async fn test_developed_group_cannot_be_traded() {
    let table = make_table(
        &[human(1, 1500), human(2, 1500)],
        &[(1, MEDITERRANEAN, 1), (1, BALTIC, 0)],
    )
    .await;

    // Baltic itself is bare, but its group carries a house.
    let err = table
        .service
        .propose_trade(table.game, PlayerId(2), PlayerId(1), make_terms(&[], 200, &[BALTIC], 0))
        .await
        .unwrap_err();
    assert!(matches!(economy_error(&err), EconomyError::InvalidTrade(_)));
    assert!(table.trades.all_trades(table.game).await.is_empty());
}

#[tokio::test]
async fn test_declined_trade_is_closed() {
    let table = make_table(&[human(1, 1500), human(2, 1500)], &[(2, ORIENTAL, 0)]).await;
    let trade = table
        .service
        .propose_trade(table.game, PlayerId(1), PlayerId(2), make_terms(&[], 10, &[ORIENTAL], 0))
        .await
        .unwrap();
    table
        .service
        .respond_to_trade(trade.id, PlayerId(2), TradeResponse::Decline)
        .await
        .unwrap();

    let err = table
        .service
        .respond_to_trade(trade.id, PlayerId(2), TradeResponse::Accept)
        .await
        .unwrap_err();
    assert!(matches!(
        economy_error(&err),
        EconomyError::InvalidTradeTransition { status: TradeStatus::Declined, .. }
    ));
    assert_eq!(table.owner(ORIENTAL).await, Owner::Player(PlayerId(2)));
}

#[tokio::test]
async fn test_automated_target_accepts_generous_and_declines_lowball() {
    let table = make_table(
        &[human(1, 1500), bot(2, 1500)],
        &[(2, ORIENTAL, 0), (2, PARK_PLACE, 0), (2, BOARDWALK, 0)],
    )
    .await;

    // Oriental is worth 100: paying 300 scores -200 for the bot.
    let generous = table
        .service
        .propose_trade(table.game, PlayerId(1), PlayerId(2), make_terms(&[], 300, &[ORIENTAL], 0))
        .await
        .unwrap();
    // 750 of property for 10 scores 740.
    let lowball = table
        .service
        .propose_trade(table.game, PlayerId(1), PlayerId(2), make_terms(&[], 10, &[PARK_PLACE, BOARDWALK], 0))
        .await
        .unwrap();

    let mut rng = StdRng::seed_from_u64(11);
    let responses = table
        .service
        .run_automated_responses(table.game, &mut rng)
        .await
        .unwrap();

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].trade, generous.id);
    assert_eq!(responses[0].decision.verdict, Verdict::Accept);
    assert_eq!(responses[0].decision.score, -200);
    assert_eq!(responses[1].trade, lowball.id);
    assert_eq!(responses[1].decision.verdict, Verdict::Decline);

    assert_eq!(table.balance(1).await, 1200);
    assert_eq!(table.balance(2).await, 1800);
    assert_eq!(table.owner(ORIENTAL).await, Owner::Player(PlayerId(1)));
    assert_eq!(table.owner(BOARDWALK).await, Owner::Player(PlayerId(2)));
    assert!(table.trades.list_pending(table.game, PlayerId(2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cash_is_conserved_across_trades() {
    let table = make_table(
        &[human(1, 1500), human(2, 1500), human(3, 1500)],
        &[(1, VERMONT, 0), (2, ORIENTAL, 0), (3, CONNECTICUT, 0)],
    )
    .await;
    let before: i64 = table.state().await.players().map(|p| p.balance).sum();

    let deals = [
        (1, 2, make_terms(&[VERMONT], 40, &[ORIENTAL], 0)),
        (3, 1, make_terms(&[], 250, &[ORIENTAL], 0)),
        (2, 3, make_terms(&[VERMONT], 0, &[CONNECTICUT], 35)),
    ];
    for (proposer, target, terms) in deals {
        let trade = table
            .service
            .propose_trade(table.game, PlayerId(proposer), PlayerId(target), terms)
            .await
            .unwrap();
        table
            .service
            .respond_to_trade(trade.id, PlayerId(target), TradeResponse::Accept)
            .await
            .unwrap();
    }

    let state = table.state().await;
    let after: i64 = state.players().map(|p| p.balance).sum();
    assert_eq!(before, after);
    assert_eq!(state.ownership(ORIENTAL).unwrap().owner, Owner::Player(PlayerId(3)));
    assert_eq!(state.ownership(CONNECTICUT).unwrap().owner, Owner::Player(PlayerId(2)));
    assert_eq!(state.ownership(VERMONT).unwrap().owner, Owner::Player(PlayerId(3)));
}
