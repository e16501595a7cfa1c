use std::collections::HashMap;

/// A named preset for an OpenAI-compatible API.
pub struct ProviderPreset {
    /// API root; endpoint paths such as `/chat/completions` are appended.
    pub default_base_url: &'static str,
    pub needs_api_key: bool,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

/// Look up a provider preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    match provider {
        "groq" => Some(ProviderPreset {
            default_base_url: "https://api.groq.com/openai/v1",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "openai" => Some(ProviderPreset {
            default_base_url: "https://api.openai.com/v1",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "ollama" => Some(ProviderPreset {
            default_base_url: "http://localhost:11434/v1",
            needs_api_key: false,
            extra_headers: &[],
        }),
        "together" => Some(ProviderPreset {
            default_base_url: "https://api.together.xyz/v1",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "openrouter" => Some(ProviderPreset {
            default_base_url: "https://openrouter.ai/api/v1",
            needs_api_key: true,
            extra_headers: &[("X-Title", "Nodeflow")],
        }),
        _ => None,
    }
}

/// Build extra headers from a preset + user config overrides.
pub fn build_extra_headers(
    preset: Option<&ProviderPreset>,
    user_headers: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = preset
        .map(|p| p.extra_headers)
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for (k, v) in user_headers {
        // User overrides take precedence
        if let Some(pos) = headers.iter().position(|(hk, _)| hk == k) {
            headers[pos].1 = v.clone();
        } else {
            headers.push((k.clone(), v.clone()));
        }
    }

    headers
}

/// List all known preset provider names.
pub fn all_preset_names() -> &'static [&'static str] {
    &["groq", "openai", "ollama", "together", "openrouter"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_preset_resolves() {
        for name in all_preset_names() {
            let preset = get_preset(name).unwrap();
            assert!(!preset.default_base_url.ends_with('/'), "{name}");
        }
        assert!(get_preset("nope").is_none());
        assert!(!get_preset("ollama").unwrap().needs_api_key);
    }

    #[test]
    fn test_user_headers_override_preset() {
        let preset = get_preset("openrouter").unwrap();
        let mut user = HashMap::new();
        user.insert("X-Title".to_string(), "Mine".to_string());
        user.insert("X-Extra".to_string(), "1".to_string());

        let headers = build_extra_headers(Some(&preset), &user);
        assert_eq!(headers.len(), 2);
        assert!(headers.contains(&("X-Title".to_string(), "Mine".to_string())));
        assert!(headers.contains(&("X-Extra".to_string(), "1".to_string())));
    }

    #[test]
    fn test_headers_without_preset() {
        let headers = build_extra_headers(None, &HashMap::new());
        assert!(headers.is_empty());
    }
}
