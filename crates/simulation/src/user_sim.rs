//! Simulated users driving the live API.
//!
//! A simulator holds one login at a time. The first scenario after start, or
//! after the API rejects the token, logs in again and is reported as the start
//! of a new session. Transport failures never escape a scenario; they show up as
//! an unsuccessful HTTP reply inside it.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use erpbot_core::BoundedHistory;
use erpbot_infra::http::{ApiClient, ApiRequest, HttpMethod};
use erpbot_probes::{login, send_bounded, Credentials};

use crate::catalog;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    BrowseProducts,
    AddCustomer,
    CreateSaleInvoice,
    SearchProducts,
    ViewReports,
    UpdateProductPrice,
    CheckInventory,
    AddSupplier,
    CreatePurchaseInvoice,
}

impl Scenario {
    pub const ALL: &'static [Scenario] = &[
        Scenario::BrowseProducts,
        Scenario::AddCustomer,
        Scenario::CreateSaleInvoice,
        Scenario::SearchProducts,
        Scenario::ViewReports,
        Scenario::UpdateProductPrice,
        Scenario::CheckInventory,
        Scenario::AddSupplier,
        Scenario::CreatePurchaseInvoice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::BrowseProducts => "browse_products",
            Scenario::AddCustomer => "add_customer",
            Scenario::CreateSaleInvoice => "create_sale_invoice",
            Scenario::SearchProducts => "search_products",
            Scenario::ViewReports => "view_reports",
            Scenario::UpdateProductPrice => "update_product_price",
            Scenario::CheckInventory => "check_inventory",
            Scenario::AddSupplier => "add_supplier",
            Scenario::CreatePurchaseInvoice => "create_purchase_invoice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub success: bool,
    /// This scenario logged in afresh.
    pub new_session: bool,
    pub detail: JsonValue,
    pub duration_ms: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub sessions: u64,
    pub scenarios: u64,
    pub successful: u64,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SessionReport {
    pub fn failed(&self) -> u64 {
        self.scenarios - self.successful
    }
}

#[derive(Debug, Clone)]
pub struct UserSimulatorConfig {
    pub credentials: Credentials,
    pub request_timeout: Duration,
    pub login_timeout: Duration,
    pub log_capacity: usize,
    /// Pause between scenarios of one session, in milliseconds.
    pub think_time_ms: RangeInclusive<u64>,
    pub seed: Option<u64>,
}

impl Default for UserSimulatorConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            request_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(5),
            log_capacity: 200,
            think_time_ms: 500..=1500,
            seed: None,
        }
    }
}

/// Reply to one scenario request; transport errors are a failed reply.
struct Reply {
    ok: bool,
    status: Option<u16>,
    body: JsonValue,
}

impl Reply {
    /// `data` when it is an array, else `data.<key>`.
    fn items(&self, key: &str) -> Vec<JsonValue> {
        let data = self.body.get("data");
        data.and_then(JsonValue::as_array)
            .or_else(|| data.and_then(|d| d.get(key)).and_then(JsonValue::as_array))
            .cloned()
            .unwrap_or_default()
    }
}

/// First of `keys` holding a positive number (or numeric string).
fn amount(item: &JsonValue, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| {
        let v = item.get(*k)?;
        let n = v
            .as_f64()
            .or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()))?;
        (n > 0.0).then(|| n.round() as i64)
    })
}

fn name_of(item: &JsonValue) -> String {
    item.get("name")
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown")
        .to_string()
}

fn id_of(item: &JsonValue) -> Option<String> {
    match item.get("id")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct UserSimulator {
    client: Arc<dyn ApiClient>,
    config: UserSimulatorConfig,
    rng: Mutex<StdRng>,
    token: Mutex<Option<String>>,
    log: Mutex<BoundedHistory<ScenarioOutcome>>,
}

impl UserSimulator {
    pub fn new(client: Arc<dyn ApiClient>, config: UserSimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let log = BoundedHistory::new(config.log_capacity);
        Self {
            client,
            config,
            rng: Mutex::new(rng),
            token: Mutex::new(None),
            log: Mutex::new(log),
        }
    }

    fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn has_session(&self) -> bool {
        self.token().is_some()
    }

    /// Most recent scenario outcomes, newest last.
    pub fn action_log(&self, limit: usize) -> Vec<ScenarioOutcome> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent_vec(limit)
    }

    /// Log in if there is no session. `true` when a new session started.
    async fn ensure_session(&self) -> bool {
        if self.has_session() {
            return false;
        }
        match login(
            self.client.as_ref(),
            &self.config.credentials,
            self.config.login_timeout,
        )
        .await
        {
            Some(token) => {
                self.set_token(Some(token));
                info!(user = %self.config.credentials.email, "simulated user logged in");
                true
            }
            None => {
                warn!("simulated user could not log in; continuing without a session");
                false
            }
        }
    }

    async fn send(&self, method: HttpMethod, path: impl Into<String>, body: Option<JsonValue>) -> Reply {
        let mut request = ApiRequest::new(method, path)
            .with_bearer(self.token().as_deref())
            .with_timeout(self.config.request_timeout);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        match send_bounded(self.client.as_ref(), request).await {
            Ok(resp) => {
                if resp.status == 401 {
                    // Expired or revoked; the next scenario logs in again.
                    self.set_token(None);
                }
                Reply {
                    ok: resp.is_success(),
                    status: Some(resp.status),
                    body: resp.body,
                }
            }
            Err(err) => {
                debug!(error = %err, "simulated request failed");
                Reply {
                    ok: false,
                    status: None,
                    body: JsonValue::Null,
                }
            }
        }
    }

    pub fn pick_scenario(&self) -> Scenario {
        self.with_rng(|rng| Scenario::ALL[rng.gen_range(0..Scenario::ALL.len())])
    }

    /// One simulation tick.
    pub async fn run_random_scenario(&self) -> ScenarioOutcome {
        let scenario = self.pick_scenario();
        self.run_scenario(scenario).await
    }

    pub async fn run_scenario(&self, scenario: Scenario) -> ScenarioOutcome {
        let new_session = self.ensure_session().await;
        let start = Instant::now();
        let (success, detail) = match scenario {
            Scenario::BrowseProducts => self.browse_products().await,
            Scenario::AddCustomer => self.add_customer().await,
            Scenario::CreateSaleInvoice => self.create_sale_invoice().await,
            Scenario::SearchProducts => self.search_products().await,
            Scenario::ViewReports => self.view_reports().await,
            Scenario::UpdateProductPrice => self.update_product_price().await,
            Scenario::CheckInventory => self.check_inventory().await,
            Scenario::AddSupplier => self.add_supplier().await,
            Scenario::CreatePurchaseInvoice => self.create_purchase_invoice().await,
        };
        let outcome = ScenarioOutcome {
            scenario,
            success,
            new_session,
            detail,
            duration_ms: start.elapsed().as_millis() as u64,
            at: Utc::now(),
        };
        debug!(scenario = scenario.as_str(), success, "scenario finished");
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
        outcome
    }

    /// A fresh login followed by `scenarios` random scenarios with think time
    /// in between.
    pub async fn run_session(&self, scenarios: usize) -> SessionReport {
        self.set_token(None);
        let mut report = SessionReport::default();
        for i in 0..scenarios {
            if i > 0 {
                let pause = self.with_rng(|rng| {
                    let range = &self.config.think_time_ms;
                    if range.start() >= range.end() {
                        *range.start()
                    } else {
                        rng.gen_range(range.clone())
                    }
                });
                if pause > 0 {
                    tokio::time::sleep(Duration::from_millis(pause)).await;
                }
            }
            let outcome = self.run_random_scenario().await;
            report.sessions += u64::from(outcome.new_session);
            report.scenarios += 1;
            report.successful += u64::from(outcome.success);
            report.outcomes.push(outcome);
        }
        info!(
            scenarios = report.scenarios,
            successful = report.successful,
            failed = report.failed(),
            "simulated session finished"
        );
        report
    }

    async fn browse_products(&self) -> (bool, JsonValue) {
        let products = self.send(HttpMethod::Get, "/api/products", None).await.items("products");
        if products.is_empty() {
            return (false, json!({ "error": "no products found" }));
        }
        let viewed = self.with_rng(|rng| products[rng.gen_range(0..products.len())].clone());
        let price = amount(&viewed, &["sale_price", "selling_price", "price"]).unwrap_or(0);
        (
            true,
            json!({ "products": products.len(), "viewed": name_of(&viewed), "price": price }),
        )
    }

    async fn add_customer(&self) -> (bool, JsonValue) {
        let body = self.with_rng(|rng| {
            let first = catalog::FIRST_NAMES[rng.gen_range(0..catalog::FIRST_NAMES.len())];
            let city = catalog::CITIES[rng.gen_range(0..catalog::CITIES.len())];
            let code = format!("C{:06}", rng.gen_range(0..1_000_000u32));
            json!({
                "code": code,
                "name": format!("{first} - {city}"),
                "type": if rng.gen_bool(0.5) { "retail" } else { "wholesale" },
                "phone": format!("077{:07}", rng.gen_range(0..10_000_000u32)),
                "email": format!("{}@example.com", code.to_lowercase()),
                "addresses": [{ "city": city, "area": "Main District" }],
                "credit_limit": rng.gen_range(0..50) * 100_000,
            })
        });
        let name = body["name"].as_str().unwrap_or_default().to_string();
        let reply = self.send(HttpMethod::Post, "/api/customers", Some(body)).await;
        // Filling the form counts even when the API refuses the record.
        (
            true,
            json!({ "customer": name, "api_success": reply.ok, "status": reply.status }),
        )
    }

    async fn create_sale_invoice(&self) -> (bool, JsonValue) {
        let customers = self.send(HttpMethod::Get, "/api/customers", None).await.items("customers");
        let products = self.send(HttpMethod::Get, "/api/products", None).await.items("products");
        if products.is_empty() {
            return (false, json!({ "error": "no products" }));
        }

        let (customer, items) = self.with_rng(|rng| {
            let customer = (!customers.is_empty())
                .then(|| customers[rng.gen_range(0..customers.len())].clone());
            let lines = rng.gen_range(1..=3usize).min(products.len());
            let items: Vec<JsonValue> = (0..lines)
                .map(|_| {
                    let product = &products[rng.gen_range(0..products.len())];
                    let qty: i64 = rng.gen_range(1..=3);
                    let price = amount(product, &["sale_price", "selling_price", "price"]).unwrap_or(100_000);
                    json!({
                        "product_id": id_of(product),
                        "name": name_of(product),
                        "quantity": qty,
                        "price": price,
                        "total": qty * price,
                    })
                })
                .collect();
            (customer, items)
        });
        let subtotal: i64 = items.iter().filter_map(|i| i["total"].as_i64()).sum();
        let customer_name = customer.as_ref().map(name_of).unwrap_or_else(|| "Walk-in".to_string());
        let body = json!({
            "type": "sale",
            "customer_id": customer.as_ref().and_then(id_of),
            "items": items,
            "subtotal": subtotal,
            "total": subtotal,
        });
        let reply = self.send(HttpMethod::Post, "/api/invoices", Some(body)).await;
        (
            true,
            json!({
                "customer": customer_name,
                "items": items.len(),
                "total": subtotal,
                "api_success": reply.ok,
            }),
        )
    }

    async fn search_products(&self) -> (bool, JsonValue) {
        let term = self.with_rng(|rng| catalog::SEARCH_TERMS[rng.gen_range(0..catalog::SEARCH_TERMS.len())]);
        let results = self
            .send(HttpMethod::Get, format!("/api/products?search={term}"), None)
            .await
            .items("products");
        (true, json!({ "term": term, "results": results.len() }))
    }

    async fn view_reports(&self) -> (bool, JsonValue) {
        const REPORTS: [&str; 4] = [
            "/api/products/stats",
            "/api/customers/stats",
            "/api/invoices/stats",
            "/api/bot/stats",
        ];
        let mut seen = serde_json::Map::new();
        for path in REPORTS {
            let reply = self.send(HttpMethod::Get, path, None).await;
            seen.insert(path.to_string(), json!(if reply.ok { "ok" } else { "failed" }));
        }
        (true, JsonValue::Object(seen))
    }

    async fn update_product_price(&self) -> (bool, JsonValue) {
        let products = self.send(HttpMethod::Get, "/api/products", None).await.items("products");
        if products.is_empty() {
            return (false, json!({ "error": "no products" }));
        }
        let (product, change) = self.with_rng(|rng| {
            (
                products[rng.gen_range(0..products.len())].clone(),
                rng.gen_range(-10.0..=10.0f64),
            )
        });
        let Some(id) = id_of(&product) else {
            return (false, json!({ "error": "product without id" }));
        };
        let old_price = amount(&product, &["sale_price", "selling_price"]).unwrap_or(100_000);
        let new_price = ((old_price as f64) * (1.0 + change / 100.0)).round() as i64;
        let reply = self
            .send(
                HttpMethod::Put,
                format!("/api/products/{id}"),
                Some(json!({ "selling_price": new_price })),
            )
            .await;
        (
            true,
            json!({
                "product": name_of(&product),
                "old_price": old_price,
                "new_price": new_price,
                "change_percent": (change * 10.0).round() / 10.0,
                "api_success": reply.ok,
            }),
        )
    }

    async fn check_inventory(&self) -> (bool, JsonValue) {
        let products = self.send(HttpMethod::Get, "/api/products", None).await.items("products");
        let quantity = |p: &JsonValue| p.get("quantity").and_then(JsonValue::as_i64).unwrap_or(0);
        let minimum = |p: &JsonValue| p.get("min_quantity").and_then(JsonValue::as_i64).unwrap_or(5);
        let low_stock = products.iter().filter(|p| quantity(*p) < minimum(*p)).count();
        let out_of_stock = products.iter().filter(|p| quantity(*p) == 0).count();
        (
            true,
            json!({
                "total": products.len(),
                "low_stock": low_stock,
                "out_of_stock": out_of_stock,
            }),
        )
    }

    async fn add_supplier(&self) -> (bool, JsonValue) {
        let body = self.with_rng(|rng| {
            let supplier = catalog::SUPPLIERS[rng.gen_range(0..catalog::SUPPLIERS.len())];
            let city = catalog::CITIES[rng.gen_range(0..catalog::CITIES.len())];
            let code = format!("S{:06}", rng.gen_range(0..1_000_000u32));
            json!({
                "code": code,
                "name": format!("{} - {city}", supplier.name),
                "phone": format!("077{:07}", rng.gen_range(0..10_000_000u32)),
                "email": format!("{}@supplier.com", code.to_lowercase()),
                "address": city,
            })
        });
        let name = body["name"].as_str().unwrap_or_default().to_string();
        let reply = self.send(HttpMethod::Post, "/api/suppliers", Some(body)).await;
        (true, json!({ "supplier": name, "api_success": reply.ok }))
    }

    async fn create_purchase_invoice(&self) -> (bool, JsonValue) {
        let suppliers = self.send(HttpMethod::Get, "/api/suppliers", None).await.items("suppliers");
        let products = self.send(HttpMethod::Get, "/api/products", None).await.items("products");
        if products.is_empty() {
            return (false, json!({ "error": "no products" }));
        }

        let (supplier, items) = self.with_rng(|rng| {
            let supplier = (!suppliers.is_empty())
                .then(|| suppliers[rng.gen_range(0..suppliers.len())].clone());
            let lines = rng.gen_range(1..=5usize).min(products.len());
            let items: Vec<JsonValue> = (0..lines)
                .map(|_| {
                    let product = &products[rng.gen_range(0..products.len())];
                    let qty: i64 = rng.gen_range(5..=24);
                    let sale = amount(product, &["sale_price", "selling_price"]).unwrap_or(100_000);
                    let cost = amount(product, &["buy_price", "cost_price"])
                        .unwrap_or_else(|| ((sale as f64) * 0.7).round() as i64);
                    json!({
                        "product_id": id_of(product),
                        "name": name_of(product),
                        "quantity": qty,
                        "price": cost,
                        "total": qty * cost,
                    })
                })
                .collect();
            (supplier, items)
        });
        let subtotal: i64 = items.iter().filter_map(|i| i["total"].as_i64()).sum();
        let body = json!({
            "type": "purchase",
            "supplier_id": supplier.as_ref().and_then(id_of),
            "items": items,
            "subtotal": subtotal,
            "total": subtotal,
        });
        let reply = self.send(HttpMethod::Post, "/api/invoices", Some(body)).await;
        (
            true,
            json!({
                "supplier": supplier.as_ref().map(name_of).unwrap_or_else(|| "Default supplier".to_string()),
                "items": items.len(),
                "total": subtotal,
                "api_success": reply.ok,
            }),
        )
    }
}
