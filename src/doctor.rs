use nodeflow_core::config::AppConfig;
use nodeflow_tasks::presets::{all_preset_names, get_preset};

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

pub fn run_doctor(config: &AppConfig) {
    let checks = vec![
        check_provider(config),
        check_api_key(config),
        check_simulation(config),
        check_retry(config),
        check_image(config),
        check_engine(config),
    ];

    // Print results
    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
}

fn check_provider(config: &AppConfig) -> CheckResult {
    let provider = &config.provider;
    match (&provider.base_url, get_preset(&provider.name)) {
        (Some(url), _) => CheckResult {
            label: "Provider".into(),
            ok: true,
            detail: format!("{} at {}", provider.name, url),
        },
        (None, Some(preset)) => CheckResult {
            label: "Provider".into(),
            ok: true,
            detail: format!("{} at {}", provider.name, preset.default_base_url),
        },
        (None, None) => CheckResult {
            label: "Provider".into(),
            ok: false,
            detail: format!(
                "Unknown provider '{}' and no base_url (known: {})",
                provider.name,
                all_preset_names().join(", ")
            ),
        },
    }
}

fn check_api_key(config: &AppConfig) -> CheckResult {
    let provider = &config.provider.name;
    let needs_key = get_preset(provider).map_or(true, |p| p.needs_api_key);

    if !needs_key || config.provider.has_api_key() {
        CheckResult {
            label: "API Key".into(),
            ok: true,
            detail: format!("Configured for {}", provider),
        }
    } else {
        CheckResult {
            label: "API Key".into(),
            ok: false,
            detail: format!("No API key set for provider '{}'", provider),
        }
    }
}

fn check_simulation(config: &AppConfig) -> CheckResult {
    let detail = if config.simulate {
        "Forced on (simulate = true), tasks return canned outputs".to_string()
    } else if config.simulation_mode() {
        "On (no credentials), tasks return canned outputs".to_string()
    } else {
        format!(
            "Off (text: {}, vision: {}, speech: {}, transcription: {}), fallback on provider errors: {}",
            config.tasks.text.model,
            config.tasks.vision.model,
            config.tasks.speech.model,
            config.tasks.transcription.model,
            if config.provider.fallback_to_simulation { "on" } else { "off" }
        )
    };
    CheckResult {
        label: "Simulation".into(),
        ok: true,
        detail,
    }
}

fn check_retry(config: &AppConfig) -> CheckResult {
    let retry = &config.provider.retry;
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return CheckResult {
            label: "Retry".into(),
            ok: false,
            detail: format!(
                "initial_backoff_ms ({}) > max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        };
    }
    CheckResult {
        label: "Retry".into(),
        ok: true,
        detail: format!(
            "{} retries, {}ms..{}ms backoff, {}s timeout",
            retry.max_retries,
            retry.initial_backoff_ms,
            retry.max_backoff_ms,
            config.provider.timeout_secs
        ),
    }
}

fn check_image(config: &AppConfig) -> CheckResult {
    let image = &config.tasks.image;
    let valid_size = image
        .size
        .split_once(['x', 'X'])
        .is_some_and(|(w, h)| w.parse::<u32>().is_ok() && h.parse::<u32>().is_ok());
    if !valid_size {
        return CheckResult {
            label: "Images".into(),
            ok: false,
            detail: format!("Invalid default size '{}', expected WIDTHxHEIGHT", image.size),
        };
    }
    let model = image.model.as_deref().unwrap_or("none, placeholder images");
    CheckResult {
        label: "Images".into(),
        ok: true,
        detail: format!("model: {}, default size {}", model, image.size),
    }
}

fn check_engine(config: &AppConfig) -> CheckResult {
    let engine = &config.engine;
    CheckResult {
        label: "Engine".into(),
        ok: engine.event_capacity > 0,
        detail: format!(
            "revisit policy {:?}, event capacity {}",
            engine.revisit, engine.event_capacity
        ),
    }
}
