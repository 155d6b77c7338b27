/// Tunables for the Safeguard Monitor (spec.md §4.10).
#[derive(Debug, Clone)]
pub struct SafeguardConfig {
    pub endpoint_whitelist: Vec<String>,
    /// Methods permitted even without `allow_real_world_impact`.
    pub simulated_methods: Vec<String>,
    pub allow_real_world_impact: bool,
    pub monetary_keywords: Vec<String>,
    pub shell_field_names: Vec<String>,
    pub retry_max: u32,
    pub cooldown_seconds: i64,
}

impl Default for SafeguardConfig {
    fn default() -> Self {
        Self {
            endpoint_whitelist: Vec::new(),
            simulated_methods: vec!["SIMULATE_TRANSFER".to_owned(), "SIMULATE_PURCHASE".to_owned(), "DRY_RUN".to_owned()],
            allow_real_world_impact: false,
            monetary_keywords: vec![
                "wire_transfer".to_owned(),
                "payment".to_owned(),
                "invoice".to_owned(),
                "bank_account".to_owned(),
                "credit_card".to_owned(),
            ],
            shell_field_names: vec!["shell".to_owned(), "cmd".to_owned(), "command".to_owned(), "exec".to_owned()],
            retry_max: 3,
            cooldown_seconds: 300,
        }
    }
}
