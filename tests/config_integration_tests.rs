//! Config-driven harness setup

#![cfg(unix)]

mod common;

use autotest::{EventQueue, HarnessConfig, Process};
use common::*;
use std::time::Duration;

#[test]
fn test_missing_file_gives_defaults() -> anyhow::Result<()> {
    let fixture = Fixture::new()?;
    let config = HarnessConfig::load(&fixture.path().join("absent.toml"))?;
    assert!(!config.verbose);
    assert_eq!(config.queue.capacity, 1);
    assert_eq!(config.queue.send_timeout, None);
    Ok(())
}

#[test]
fn test_invalid_file_is_rejected() -> anyhow::Result<()> {
    let fixture = Fixture::new()?;
    let err = fixture
        .config("log_level = \"loud\"\n[queue]\ncapacity = 0\n")
        .unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("log_level"), "{}", message);
    assert!(message.contains("capacity"), "{}", message);
    Ok(())
}

#[tokio::test]
async fn test_config_drives_working_dir_and_queue() -> anyhow::Result<()> {
    let fixture = Fixture::new()?;
    fixture.write("data/greeting.txt", "hello from fixture\n")?;
    let config = fixture.config(&format!(
        "working_dir = {:?}\n[queue]\ncapacity = 4\nsend_timeout = \"10s\"\n",
        fixture.path().join("data")
    ))?;
    assert_eq!(config.queue.send_timeout, Some(Duration::from_secs(10)));

    let mut queue = EventQueue::with_config(&config.queue);
    let mut process = Process::new("cat", ["greeting.txt"]).with_config(&config);
    process.add_trigger("hello (.*)", HELLO)?;
    process.start(&queue)?;

    queue.expect(HELLO, &["from fixture"]).await?;
    process.wait().await?;
    Ok(())
}
