//! Notification formatter (spec.md §4.C7): groups one tick's emissions per
//! configuration, builds plain-text messages with embedded order buttons,
//! and mints the tokens those buttons reference. Grounded on
//! `server_monitor.py`'s `send_availability_alert_grouped` /
//! `send_unavailable_alert_grouped` (the dc display maps, the detected/push
//! time + delay block, the closing hint) and on the teacher's
//! `async_trait`-driven dependency-injection style for the actual send call.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sniper_core::{
    Button, ButtonGrid, EffectiveStatus, LogLevel, LogSink, SendNotification, Subscription,
    TokenCache, TokenEntry, TraceId, TransitionEmission,
};

/// One formatted notification: text plus an optional button layout.
#[derive(Debug, Clone)]
pub struct NotificationText {
    pub text: String,
    pub buttons: Option<ButtonGrid>,
}

fn dc_display(dc: &str) -> String {
    let name = match dc.to_lowercase().as_str() {
        "gra" => "🇫🇷 Gravelines",
        "rbx" => "🇫🇷 Roubaix",
        "sbg" => "🇫🇷 Strasbourg",
        "bhs" => "🇨🇦 Beauharnois",
        "syd" => "🇦🇺 Sydney",
        "sgp" => "🇸🇬 Singapore",
        "ynm" => "🇮🇳 Mumbai",
        "waw" => "🇵🇱 Warsaw",
        "fra" => "🇩🇪 Frankfurt",
        "lon" => "🇬🇧 London",
        "par" => "🇫🇷 Paris",
        "eri" => "🇮🇹 Eriche",
        "lim" => "🇵🇱 Limanowa",
        "vin" => "🇺🇸 Virginia",
        "hil" => "🇺🇸 Oregon",
        _ => return dc.to_uppercase(),
    };
    format!("{name} ({})", dc.to_uppercase())
}

fn dc_short(dc: &str) -> String {
    let short = match dc.to_lowercase().as_str() {
        "gra" => "🇫🇷 Gra",
        "rbx" => "🇫🇷 Rbx",
        "sbg" => "🇫🇷 Sbg",
        "bhs" => "🇨🇦 Bhs",
        "syd" => "🇦🇺 Syd",
        "sgp" => "🇸🇬 Sgp",
        "ynm" => "🇮🇳 Mum",
        "waw" => "🇵🇱 Waw",
        "fra" => "🇩🇪 Fra",
        "lon" => "🇬🇧 Lon",
        "par" => "🇫🇷 Par",
        "eri" => "🇮🇹 Eri",
        "lim" => "🇵🇱 Lim",
        "vin" => "🇺🇸 Vin",
        "hil" => "🇺🇸 Hil",
        _ => return dc.to_uppercase(),
    };
    short.to_string()
}

fn fmt_ts(ts: DateTime<Tz>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn push_delay_line(detected: DateTime<Tz>, pushed: DateTime<Tz>) -> String {
    let delay = pushed - detected;
    format!(
        "⏰ Detected: {}\n📤 Pushed: {}\n⏱️ Push delay: {}",
        fmt_ts(detected),
        fmt_ts(pushed),
        sniper_core::format_elapsed(delay)
    )
}

fn trace_line(sub_trace: TraceId, config_trace: Option<TraceId>) -> String {
    match config_trace {
        Some(cfg) => format!("🆔 Trace ID:\n  subscription: {sub_trace}\n  config: {cfg}"),
        None => format!("🆔 Trace ID: {sub_trace}"),
    }
}

/// Groups `emissions` by `config_key`, preserving the order configurations
/// first appeared in (spec.md §4.C6 step 10).
fn group_by_config(emissions: &[TransitionEmission]) -> Vec<(Option<String>, Vec<&TransitionEmission>)> {
    let mut order = Vec::new();
    let mut groups: HashMap<Option<String>, Vec<&TransitionEmission>> = HashMap::new();
    for emission in emissions {
        if !groups.contains_key(&emission.config_key) {
            order.push(emission.config_key.clone());
        }
        groups.entry(emission.config_key.clone()).or_default().push(emission);
    }
    order
        .into_iter()
        .map(|key| {
            let v = groups.remove(&key).unwrap_or_default();
            (key, v)
        })
        .collect()
}

fn available_message(
    sub: &Subscription,
    rows: &[&TransitionEmission],
    sub_trace: TraceId,
    config_trace: Option<TraceId>,
    push_time: DateTime<Tz>,
    tokens: &TokenCache,
) -> NotificationText {
    let mut text = String::from("🎉 Server available!\n\n");
    if let Some(name) = &sub.server_name {
        text.push_str(&format!("Server: {name}\n"));
    }
    text.push_str(&format!("Plan: {}\n", sub.plan_code));

    let descriptor = rows.first().and_then(|r| r.descriptor.as_ref());
    if let Some(desc) = descriptor {
        text.push_str(&format!(
            "Config: {}\n├─ Memory: {}\n└─ Storage: {}\n",
            desc.display, desc.memory, desc.storage
        ));
    }

    if let Some(hint) = rows.iter().find_map(|r| r.price_hint.as_ref()) {
        let currency = hint.currency.as_deref().unwrap_or("");
        text.push_str(&format!("\n💰 Price: {:.2} {currency}\n", hint.with_tax));
    }

    text.push_str(&format!("\n✅ Available datacenters ({}):\n", rows.len()));
    let mut buttons = Vec::with_capacity(rows.len());
    let mut earliest: Option<DateTime<Tz>> = None;
    for row in rows {
        text.push_str(&format!("  • {}", dc_display(&row.datacenter)));
        if let Some(duration) = row.duration {
            text.push_str(&format!(
                " - ⏱️ was unavailable for: {}",
                sniper_core::format_elapsed(duration)
            ));
        }
        text.push('\n');
        earliest = Some(earliest.map_or(row.detected_at, |e: DateTime<Tz>| e.min(row.detected_at)));

        let options = descriptor.map(|d| d.options.clone()).unwrap_or_default();
        let token = tokens.insert(TokenEntry {
            plan_code: sub.plan_code.clone(),
            datacenter: row.datacenter.clone(),
            options,
            config_display: descriptor.map(|d| d.display.clone()),
            timestamp: Utc::now(),
        });
        buttons.push(Button {
            text: format!("{} one-click order", dc_short(&row.datacenter)),
            callback_data: format!(r#"{{"a":"add_to_queue","u":"{token}"}}"#),
        });
    }

    text.push_str(&format!("\n{}", trace_line(sub_trace, config_trace)));
    text.push_str(&format!(
        "\n{}",
        push_delay_line(earliest.unwrap_or(push_time), push_time)
    ));
    text.push_str("\n\n💡 Tap a button below to order that datacenter directly.");

    NotificationText {
        text,
        buttons: Some(ButtonGrid::from_buttons(buttons)),
    }
}

fn unavailable_message(
    sub: &Subscription,
    rows: &[&TransitionEmission],
    sub_trace: TraceId,
    config_trace: Option<TraceId>,
    push_time: DateTime<Tz>,
) -> NotificationText {
    let mut text = String::from("📦 Server unavailable\n\n");
    if let Some(name) = &sub.server_name {
        text.push_str(&format!("Server: {name}\n"));
    }
    text.push_str(&format!("Plan: {}\n", sub.plan_code));

    let descriptor = rows.first().and_then(|r| r.descriptor.as_ref());
    if let Some(desc) = descriptor {
        text.push_str(&format!(
            "Config: {}\n├─ Memory: {}\n└─ Storage: {}\n",
            desc.display, desc.memory, desc.storage
        ));
    }

    text.push_str(&format!("\nNow unavailable ({}):\n", rows.len()));
    for row in rows {
        text.push_str(&format!("  • {}", dc_display(&row.datacenter)));
        if let Some(duration) = row.duration {
            text.push_str(&format!(
                " - ⏱️ was available for: {}",
                sniper_core::format_elapsed(duration)
            ));
        }
        text.push('\n');
    }

    text.push_str(&format!("\n{}", trace_line(sub_trace, config_trace)));
    text.push_str(&format!("\n⏰ Pushed: {}", fmt_ts(push_time)));

    NotificationText { text, buttons: None }
}

fn price_check_failed_message(
    sub: &Subscription,
    row: &TransitionEmission,
    sub_trace: TraceId,
    config_trace: Option<TraceId>,
    push_time: DateTime<Tz>,
) -> NotificationText {
    let mut text = String::from("⚠️ Listed available, not orderable\n\n");
    if let Some(name) = &sub.server_name {
        text.push_str(&format!("Server: {name}\n"));
    }
    text.push_str(&format!("Plan: {}\n", sub.plan_code));
    text.push_str(&format!("Datacenter: {}\n", dc_display(&row.datacenter)));
    if let Some(reason) = &row.verifier_reason {
        text.push_str(&format!("Reason: {reason}\n"));
    }
    text.push_str(&format!("\n{}", trace_line(sub_trace, config_trace)));
    text.push_str(&format!("\n⏰ Pushed: {}", fmt_ts(push_time)));

    NotificationText { text, buttons: None }
}

/// Formats and sends every notification owed by one subscription's tick
/// (spec.md §4.C6 step 10 / §4.C7). `sub_trace` is the subscription-level
/// trace ID; a fresh configuration-level trace ID is minted per group.
pub async fn notify_tick(
    sender: &dyn SendNotification,
    log: &dyn LogSink,
    tokens: &TokenCache,
    sub: &Subscription,
    emissions: &[TransitionEmission],
    sub_trace: TraceId,
    push_time: DateTime<Tz>,
) {
    for (config_key, rows) in group_by_config(emissions) {
        let config_trace = config_key.as_ref().map(|_| TraceId::new());

        let available: Vec<&TransitionEmission> = rows
            .iter()
            .filter(|r| r.new_status == EffectiveStatus::Available)
            .copied()
            .collect();
        let unavailable: Vec<&TransitionEmission> = rows
            .iter()
            .filter(|r| r.new_status == EffectiveStatus::Unavailable)
            .copied()
            .collect();
        let failed: Vec<&TransitionEmission> = rows
            .iter()
            .filter(|r| r.new_status == EffectiveStatus::PriceCheckFailed)
            .copied()
            .collect();

        if !available.is_empty() {
            let msg = available_message(sub, &available, sub_trace, config_trace, push_time, tokens);
            deliver(sender, log, &msg, &sub.plan_code).await;
        }
        if !unavailable.is_empty() {
            let msg = unavailable_message(sub, &unavailable, sub_trace, config_trace, push_time);
            deliver(sender, log, &msg, &sub.plan_code).await;
        }
        for row in failed {
            let msg = price_check_failed_message(sub, row, sub_trace, config_trace, push_time);
            deliver(sender, log, &msg, &sub.plan_code).await;
        }
    }
}

async fn deliver(sender: &dyn SendNotification, log: &dyn LogSink, msg: &NotificationText, plan_code: &str) {
    let ok = sender.send(&msg.text, msg.buttons.as_ref()).await;
    if !ok {
        log.log(
            LogLevel::Warning,
            &format!("notification delivery failed for {plan_code}"),
            "notifier",
            None,
        );
    }
}
