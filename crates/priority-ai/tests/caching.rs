mod common;

use std::sync::{Arc, Mutex};

use common::{ME, world};
use priority_ai::{
    AiNode, AiTree, Behaviour, Cond, Controller, EntityId, OddsClass, Setup, ShipState, Vector,
    fallback,
};

const FIRST: EntityId = EntityId(2);
const SECOND: EntityId = EntityId(3);

#[test]
fn odds_are_computed_once_per_pass() -> anyhow::Result<()> {
    let (mut host, mut session) = world();
    host.add_ship(ShipState::new(FIRST, "pirate"));
    host.add_ship(ShipState::new(SECOND, "pirate"));
    host.threats.insert(ME, 3.0);
    host.threats.insert(FIRST, 2.0);
    host.threats.insert(SECOND, 0.5);
    if let Some(me) = host.ships.get_mut(&ME) {
        me.target = Some(FIRST);
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let record = session.rules_mut().register_action("record_odds", move |ctx| {
        let ratio = ctx.odds_assessment();
        log.lock().unwrap().push(ratio);
    });
    let retarget = session.rules_mut().register_condition("retarget", |ctx| {
        ctx.set_target(Some(SECOND));
        false
    });

    let tree = AiTree::new(
        "cached",
        vec![
            AiNode::new()
                .preconfigure(Setup::Custom(record))
                .when(Cond::Custom(retarget))
                .behaviour(Behaviour::Tumble),
            AiNode::new()
                .preconfigure(Setup::Custom(record))
                .behaviour(Behaviour::Idle),
        ],
    );
    let mut ai = Controller::new(ME);
    ai.set_priorities(&host, tree, Some(1.0))?;

    ai.reconsider(&mut host, &session)?;
    // The target changed mid-pass but the ratio did not.
    assert_eq!(*seen.lock().unwrap(), vec![1.5, 1.5]);

    host.advance(1.0);
    ai.reconsider(&mut host, &session)?;
    assert_eq!(*seen.lock().unwrap(), vec![1.5, 1.5, 6.0, 6.0]);
    Ok(())
}

#[test]
fn nearest_station_is_kept_for_the_long_term_window() -> anyhow::Result<()> {
    let (mut host, mut session) = world();
    for (id, z) in [(FIRST, 10_000.0), (SECOND, 50_000.0)] {
        let mut station = ShipState::new(id, "station").at(Vector::new(0.0, 0.0, z));
        station.is_station = true;
        host.add_ship(station);
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let record = session
        .rules_mut()
        .register_condition("record_station", move |ctx| {
            let station = ctx.nearest_station();
            log.lock().unwrap().push(station);
            false
        });
    let tree = AiTree::new(
        "stations",
        vec![
            AiNode::new()
                .when(Cond::Custom(record))
                .behaviour(Behaviour::Tumble),
            fallback(Behaviour::Idle),
        ],
    );
    let mut ai = Controller::new(ME);
    ai.set_priorities(&host, tree, Some(1.0))?;

    ai.reconsider(&mut host, &session)?;
    if let Some(second) = host.ships.get_mut(&SECOND) {
        second.position = Vector::new(0.0, 0.0, 1_000.0);
    }
    host.advance(59.0);
    ai.reconsider(&mut host, &session)?;
    host.advance(2.0);
    ai.reconsider(&mut host, &session)?;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(FIRST), Some(FIRST), Some(SECOND)]
    );
    Ok(())
}

#[test]
fn odds_classes_follow_the_configured_thresholds() {
    let odds = priority_ai::AiConfig::default().odds;
    let classify = |us: f64, them: f64| OddsClass::classify(us / them, &odds, false, false);

    assert_eq!(classify(3.0, 2.0), OddsClass::Good);
    assert_eq!(classify(1.0, 0.5), OddsClass::Good);
    assert_eq!(classify(5.0, 1.0), OddsClass::Excellent);
    assert_eq!(classify(1.0, 1.0), OddsClass::Even);
    assert_eq!(classify(0.5, 1.0), OddsClass::Bad);
    assert_eq!(classify(0.3, 1.0), OddsClass::Terrible);

    // A ship that surrenders early already counts 0.5 as terrible.
    assert_eq!(OddsClass::classify(0.5, &odds, true, false), OddsClass::Terrible);
    // One that surrenders late still counts it as even.
    assert_eq!(OddsClass::classify(0.5, &odds, false, true), OddsClass::Even);
}

#[test]
fn station_appearing_mid_window_is_found() -> anyhow::Result<()> {
    let (mut host, mut session) = world();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let record = session
        .rules_mut()
        .register_condition("record_station", move |ctx| {
            let station = ctx.nearest_station();
            log.lock().unwrap().push(station);
            false
        });
    let tree = AiTree::new(
        "stations",
        vec![
            AiNode::new()
                .when(Cond::Custom(record))
                .behaviour(Behaviour::Tumble),
            fallback(Behaviour::Idle),
        ],
    );
    let mut ai = Controller::new(ME);
    ai.set_priorities(&host, tree, Some(1.0))?;
    ai.reconsider(&mut host, &session)?;

    let mut station = ShipState::new(EntityId(9), "station").at(Vector::new(0.0, 0.0, 5_000.0));
    station.is_station = true;
    host.add_ship(station);
    host.advance(10.0);
    ai.reconsider(&mut host, &session)?;

    assert_eq!(*seen.lock().unwrap(), vec![None, Some(EntityId(9))]);
    Ok(())
}
