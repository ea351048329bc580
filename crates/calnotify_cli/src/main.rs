//! Command-line access to a local alert store.
//!
//! # Responsibility
//! - Verify `calnotify_core` linkage and print version/usage.
//! - Run one store command per invocation with deterministic output.
//!
//! Environment: `CALNOTIFY_CONFIG` (JSON config path) and
//! `CALNOTIFY_LOG_DIR` (absolute log directory; logging is off when unset).

use calnotify_core::db::open_db;
use calnotify_core::{
    core_version, init_logging, load_config, now_epoch_ms, AlertService, CalNotifyConfig,
    EventAlertKey, EventAlertRecord, SqliteEventAlertRepository,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;

const USAGE: &str = "usage: calnotify_cli <db-path> [list|active|presets|dismiss <event-id> <instance-start>|snooze <event-id> <instance-start> <minutes>|snooze-preset <event-id> <instance-start> <index>]";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        println!("calnotify_core version={}", core_version());
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let config = match std::env::var_os("CALNOTIFY_CONFIG") {
        Some(path) => load_config(path)?,
        None => CalNotifyConfig::default(),
    };
    if let Some(log_dir) = std::env::var_os("CALNOTIFY_LOG_DIR") {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = open_db(&args[0])?;
    let repo = SqliteEventAlertRepository::new(&conn)
        .with_notification_id_from(config.notification_id_dynamic_from);
    let service = AlertService::from_config(repo, &config);
    let now = now_epoch_ms();

    match args.get(1).map(String::as_str).unwrap_or("list") {
        "list" => print_alerts(&service.all_alerts()?),
        "active" => print_alerts(&service.active_alerts(now)?),
        "dismiss" => {
            let key = parse_key(args)?;
            let removed = service.dismiss(key)?;
            println!("dismissed={removed} key={key}");
        }
        "presets" => {
            for (index, delay_ms) in config.snooze_presets_ms.iter().enumerate() {
                println!("preset={index} delay_ms={delay_ms}");
            }
        }
        "snooze" => {
            let key = parse_key(args)?;
            let minutes: i64 = args.get(4).ok_or(USAGE)?.parse()?;
            let delay_ms = minutes_to_ms(minutes)
                .ok_or_else(|| format!("snooze of {minutes} minutes is out of range\n{USAGE}"))?;
            snooze(&service, key, delay_ms, now)?;
        }
        "snooze-preset" => {
            let key = parse_key(args)?;
            let index: usize = args.get(4).ok_or(USAGE)?.parse()?;
            let delay_ms = config
                .snooze_preset_ms(index)
                .ok_or_else(|| format!("no snooze preset {index}\n{USAGE}"))?;
            snooze(&service, key, delay_ms, now)?;
        }
        other => return Err(format!("unknown command `{other}`\n{USAGE}").into()),
    }
    Ok(())
}

fn snooze(
    service: &AlertService<SqliteEventAlertRepository<'_>>,
    key: EventAlertKey,
    delay_ms: i64,
    now: i64,
) -> Result<(), Box<dyn Error>> {
    let until = snooze_target(now, delay_ms)
        .ok_or_else(|| format!("snooze delay {delay_ms} ms is out of range\n{USAGE}"))?;
    let alert = service.snooze(key, until, now)?;
    println!("snoozed key={} until={}", alert.key(), alert.snoozed_until);
    Ok(())
}

fn minutes_to_ms(minutes: i64) -> Option<i64> {
    minutes.checked_mul(60_000)
}

/// `None` when `now + delay_ms` does not fit in epoch milliseconds.
fn snooze_target(now: i64, delay_ms: i64) -> Option<i64> {
    now.checked_add(delay_ms)
}

fn parse_key(args: &[String]) -> Result<EventAlertKey, Box<dyn Error>> {
    let event_id: i64 = args.get(2).ok_or(USAGE)?.parse()?;
    let instance_start: i64 = args.get(3).ok_or(USAGE)?.parse()?;
    Ok(EventAlertKey::new(event_id, instance_start))
}

fn print_alerts(alerts: &[EventAlertRecord]) {
    println!("count={}", alerts.len());
    for alert in alerts {
        println!(
            "key={} notification_id={} start={} end={} snoozed_until={} status={:?} title={}",
            alert.key(),
            alert.notification_id,
            alert.displayed_start_time(),
            alert.displayed_end_time(),
            alert.snoozed_until,
            alert.display_status,
            alert.title
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{minutes_to_ms, snooze_target};

    #[test]
    fn snooze_arithmetic_rejects_overflow() {
        assert_eq!(minutes_to_ms(15), Some(900_000));
        assert_eq!(minutes_to_ms(i64::MAX / 1_000), None);

        let now = 1_700_000_000_000;
        assert_eq!(snooze_target(now, 900_000), Some(now + 900_000));
        assert_eq!(snooze_target(now, i64::MAX - 1), None);
    }
}
