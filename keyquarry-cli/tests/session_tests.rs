use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;

use keyquarry_cli::server::config::ConfigLoad;
use keyquarry_cli::server::session::Session;

#[tokio::test]
async fn set_get_and_delete_round_trip() -> Result<()> {
    let config = ConfigLoad::default();
    let running = Arc::new(AtomicBool::new(true));
    let mut session = Session::try_new(config, false, running).await?;

    session.handle_reader(Cursor::new("SET order_key xxx")).await?;
    session.handle_reader(Cursor::new("GET order_key")).await?;
    session.handle_reader(Cursor::new("EXISTS order_key")).await?;
    session.handle_reader(Cursor::new("DEL order_key")).await?;
    session.handle_reader(Cursor::new("GET order_key")).await?;

    Ok(())
}

#[tokio::test]
async fn keys_and_stats_reflect_inserted_entries() -> Result<()> {
    let config = ConfigLoad::default();
    let running = Arc::new(AtomicBool::new(true));
    let mut session = Session::try_new(config, false, running).await?;

    session
        .handle_reader(Cursor::new("SET a one\nSET b two\nSET c three"))
        .await?;
    session.handle_reader(Cursor::new("KEYS")).await?;
    session.handle_reader(Cursor::new("KSIZE")).await?;
    session.handle_reader(Cursor::new("STATS")).await?;

    Ok(())
}

#[tokio::test]
async fn lock_and_unlock_round_trip() -> Result<()> {
    // The CLI dispatches every command under one fixed client id, so a lock
    // it takes never blocks its own later commands (only a foreign client's
    // mutations are rejected) -- this just exercises the LOCK/UNLOCK verbs.
    let config = ConfigLoad::default();
    let running = Arc::new(AtomicBool::new(true));
    let mut session = Session::try_new(config, false, running).await?;

    session.handle_reader(Cursor::new("SET guarded value")).await?;
    session.handle_reader(Cursor::new("LOCK guarded 60")).await?;
    session.handle_reader(Cursor::new("SET guarded other")).await?;
    session.handle_reader(Cursor::new("UNLOCK guarded")).await?;

    Ok(())
}

#[tokio::test]
async fn register_round_trips() -> Result<()> {
    let config = ConfigLoad::default();
    let running = Arc::new(AtomicBool::new(true));
    let mut session = Session::try_new(config, false, running).await?;

    session.handle_reader(Cursor::new("REGISTER")).await?;

    Ok(())
}

#[tokio::test]
async fn set_readonly_round_trips_for_a_privileged_client() -> Result<()> {
    let mut config = ConfigLoad::default();
    config.kernel.privileged_client_id = Some("keyquarry-cli".to_string());
    let running = Arc::new(AtomicBool::new(true));
    let mut session = Session::try_new(config, false, running).await?;

    session.handle_reader(Cursor::new("SETREADONLY false")).await?;

    Ok(())
}

#[tokio::test]
async fn set_readonly_is_denied_for_an_unprivileged_client() -> Result<()> {
    let config = ConfigLoad::default();
    let running = Arc::new(AtomicBool::new(true));
    let mut session = Session::try_new(config, false, running).await?;

    assert!(session.handle_reader(Cursor::new("SETREADONLY false")).await.is_err());

    Ok(())
}
