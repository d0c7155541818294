mod common;

use common::{ME, world};
use priority_ai::{AiNode, AiTree, Behaviour, Controller, EngineMode, GameEvent, fallback};

fn idle() -> AiTree {
    AiTree::new("idle", vec![fallback(Behaviour::Idle)])
}

#[test]
fn later_requests_never_postpone_an_earlier_wake() -> anyhow::Result<()> {
    let (host, session) = world();
    let mut ai = Controller::new(ME);
    ai.set_priorities(&host, idle(), Some(30.0))?;
    assert_eq!(ai.wake_time(), 1_030.0);

    ai.reconsider_in(&host, &session, 60.0);
    assert_eq!(ai.wake_time(), 1_030.0);

    ai.reconsider_in(&host, &session, 10.0);
    assert_eq!(ai.wake_time(), 1_010.0);

    ai.reconsider_now(&host, &session);
    assert!((ai.wake_time() - 1_000.1).abs() < 1e-9);
    Ok(())
}

#[test]
fn node_reconsider_value_schedules_the_next_pass() -> anyhow::Result<()> {
    let (mut host, session) = world();
    let mut ai = Controller::new(ME);
    let tree = AiTree::new(
        "patient",
        vec![AiNode::new().behaviour(Behaviour::Idle).reconsider(20.0)],
    );
    ai.set_priorities(&host, tree, Some(1.0))?;
    host.advance(1.0);
    assert_eq!(ai.tick(&mut host, &session)?, Some(Behaviour::Idle));
    assert_eq!(ai.wake_time(), 1_021.0);

    host.advance(19.0);
    assert_eq!(ai.tick(&mut host, &session)?, None);
    host.advance(1.0);
    assert_eq!(ai.tick(&mut host, &session)?, Some(Behaviour::Idle));
    Ok(())
}

#[test]
fn behaviour_without_reconsider_sleeps_until_woken() -> anyhow::Result<()> {
    let (mut host, session) = world();
    let mut ai = Controller::new(ME);
    ai.set_priorities(&host, idle(), Some(1.0))?;
    host.advance(1.0);
    ai.tick(&mut host, &session)?;
    assert_eq!(ai.wake_time(), 0.0);

    host.advance(3_600.0);
    assert_eq!(ai.tick(&mut host, &session)?, None);

    ai.dispatch(&mut host, &session, &GameEvent::AiAwoken)?;
    assert_eq!(host.commands.len(), 2);
    Ok(())
}

#[test]
fn legacy_engine_replaces_the_wake_time() -> anyhow::Result<()> {
    let (host, session) = world();
    let mut ai = Controller::with_mode(ME, EngineMode::Legacy);
    ai.set_priorities(&host, idle(), Some(5.0))?;
    ai.reconsider_in(&host, &session, 60.0);
    assert_eq!(ai.wake_time(), 1_060.0);
    ai.reconsider_now(&host, &session);
    assert_eq!(ai.wake_time(), 1_000.25);
    Ok(())
}

#[test]
fn teardown_clears_the_schedule_and_rejects_further_use() -> anyhow::Result<()> {
    let (mut host, session) = world();
    let mut ai = Controller::new(ME);
    ai.set_priorities(&host, idle(), Some(5.0))?;
    ai.cleanup();
    assert_eq!(ai.wake_time(), 0.0);
    assert!(ai.handlers().is_empty());
    assert!(ai.tick(&mut host, &session).is_err());
    assert!(ai.set_priorities(&host, idle(), None).is_err());
    Ok(())
}
