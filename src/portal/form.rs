//! Search form filling and submission.
//!
//! The portal's bound state does not reliably reflect direct field edits, so
//! every fill uses a two-tier strategy: inject values straight into the
//! framework's data-binding scope inside a single digest, and fall back to
//! DOM typing (with a focus-leave) when the injection does not explicitly
//! succeed.

use tracing::{debug, info, warn};

use crate::browser::{js_string, Session};
use crate::error::{Result, ScrapeError};
use crate::portal::doc_types::ALL_DOC_TYPES;
use crate::wait::{self, WaitPolicy, MODAL_WAIT, RESULTS_WAIT};

/// One search request's worth of criteria, dates already normalized to the
/// portal's `MM/DD/YYYY` form.
#[derive(Debug, Clone)]
pub struct SearchCriteria {
    pub party_name: String,
    pub township: Option<String>,
    pub lot: Option<String>,
    pub block: Option<String>,
    pub from_date: String,
    pub to_date: String,
}

const INJECTION_TEMPLATE: &str = r#"(() => {
    const partyName = __PARTY__;
    const town = __TOWN__;
    const fromDate = __FROM__;
    const toDate = __TO__;
    const allDocTypes = __DOC_TYPES__;
    try {
        const inputs = Array.from(document.querySelectorAll('input[placeholder="Party Name"]'));
        const partyInput = inputs.find(i => i.offsetWidth > 0 && i.offsetHeight > 0) || inputs[0];
        if (!partyInput) return "NO_INPUT";

        let scope = angular.element(partyInput).scope();
        if (!scope || !scope.documentService) {
            scope = angular.element(document.querySelector('div[ng-view]')).scope() ||
                    angular.element(document.body).scope();
        }
        if (scope && scope.documentService && scope.documentService.SearchCriteria) {
            scope.$apply(function() {
                scope.documentService.SearchCriteria.searchTerm = partyName;
                scope.documentService.SearchCriteria.searchPartyName = partyName;
                if (town) scope.documentService.SearchCriteria.searchCommonTown = town.toUpperCase();
                scope.documentService.SearchCriteria.fromDate = fromDate;
                scope.documentService.SearchCriteria.toDate = toDate;
                scope.documentService.SearchCriteria.searchDocType = allDocTypes;
            });
            return "INJECTED_SUCCESS";
        }
        return "SCOPE_MISSING";
    } catch (e) {
        return "ERROR: " + e.toString();
    }
})()"#;

/// Fill the party-name form: model injection first, DOM typing fallback,
/// then the "select all document types" checkbox.
pub async fn fill_party_form(session: &Session, criteria: &SearchCriteria) -> Result<()> {
    info!("Filling form for party: {}", criteria.party_name);

    let script = INJECTION_TEMPLATE
        .replace("__PARTY__", &js_string(&criteria.party_name))
        .replace("__TOWN__", &js_string(criteria.township.as_deref().unwrap_or("")))
        .replace("__FROM__", &js_string(&criteria.from_date))
        .replace("__TO__", &js_string(&criteria.to_date))
        .replace("__DOC_TYPES__", &js_string(ALL_DOC_TYPES));

    let status: String = session.eval_value(&script).await?;
    info!("Model injection status: {status}");

    if !status.contains("SUCCESS") {
        debug!("Applying DOM fallback");
        dom_type_party_name(session, &criteria.party_name).await?;
    }

    select_all_doc_types(session).await;
    Ok(())
}

/// Clear the visible party input and type the value, then tab away so the
/// framework notices the change.
async fn dom_type_party_name(session: &Session, party_name: &str) -> Result<()> {
    let input = session
        .page()
        .find_element("input[placeholder='Party Name']")
        .await
        .map_err(|e| ScrapeError::ElementNotFound(e.to_string()))?;
    input.click().await?;
    session
        .eval(
            r#"(() => {
                const i = document.querySelector("input[placeholder='Party Name']");
                if (i) i.value = '';
            })()"#,
        )
        .await?;
    input.type_str(party_name).await?;
    input.press_key("Tab").await?;
    Ok(())
}

/// Toggle the "ALL" tree checkbox (only when unchecked), then verify the
/// document-type field actually got populated and force-fill it otherwise.
/// Failures here are logged and tolerated; the search can still run with the
/// portal's default filter.
async fn select_all_doc_types(session: &Session) {
    debug!("Handling 'ALL' checkbox / doc types");
    let toggle = session
        .eval_value::<String>(
            r#"(() => {
                const box = document.querySelector("input.tree-checkbox")
                    || document.querySelector("input[class*='tree-checkbox']");
                if (!box) return "NOT_FOUND";
                box.scrollIntoView({block: 'center'});
                if (box.checked) return "ALREADY_SELECTED";
                box.click();
                return "CLICKED";
            })()"#,
        )
        .await;

    match toggle {
        Ok(status) => {
            debug!("'ALL' checkbox: {status}");
            if status == "CLICKED" {
                // Give the auto-fill a moment before verifying.
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
        Err(e) => warn!("Checkbox interaction error: {e}"),
    }

    let force_fill = format!(
        r#"(() => {{
            const docInput = document.querySelectorAll("input[ng-model*='DocType']")[0] ||
                             document.querySelector("input[placeholder*='Document Type']");
            const allTypes = {all_types};
            if (docInput && !docInput.value) {{
                docInput.value = allTypes;
                angular.element(docInput).triggerHandler('input');
                angular.element(docInput).triggerHandler('change');
                return "FORCE_FILLED";
            }}
            return docInput ? "ALREADY_FILLED" : "NO_DOC_INPUT";
        }})()"#,
        all_types = js_string(ALL_DOC_TYPES)
    );
    match session.eval_value::<String>(&force_fill).await {
        Ok(status) => debug!("Doc type field: {status}"),
        Err(e) => warn!("Doc type fill warning: {e}"),
    }
}

/// Select the township in the Town/Lot/Block dropdown.
///
/// Three tiers, in order: raw value match (case-insensitive, change event
/// dispatched), exact text-or-value match across options, substring match.
/// No match is terminal for the request — the error lists the first ten
/// available options.
pub async fn select_township(session: &Session, township: &str) -> Result<()> {
    let script = format!(
        r#"(() => {{
            const target = {target}.trim().toUpperCase();
            const sel = document.querySelector(
                "select[ng-model='documentService.SearchCriteria.searchCommonTown']");
            if (!sel) return JSON.stringify({{ matched: false, available: [] }});

            const fire = (opt) => {{
                opt.selected = true;
                sel.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }};
            const options = Array.from(sel.options);
            const norm = (s) => (s || '').replace(/\u00a0/g, ' ').trim().toUpperCase();

            let match = options.find(o => norm(o.value) === target);
            if (!match) {{
                match = options.find(o => norm(o.text) === target || norm(o.value) === target);
            }}
            if (!match) {{
                match = options.find(o =>
                    norm(o.text).includes(target) || norm(o.value).includes(target));
            }}
            if (match) {{
                fire(match);
                return JSON.stringify({{ matched: true, available: [] }});
            }}
            const available = options.slice(0, 10)
                .map(o => `${{o.text.trim()}}(${{o.value}})`);
            return JSON.stringify({{ matched: false, available }});
        }})()"#,
        target = js_string(township)
    );

    #[derive(serde::Deserialize)]
    struct TownSelect {
        matched: bool,
        available: Vec<String>,
    }

    let raw: String = session.eval_value(&script).await?;
    let outcome: TownSelect =
        serde_json::from_str(&raw).map_err(|e| ScrapeError::Js(e.to_string()))?;
    if !outcome.matched {
        return Err(ScrapeError::TownNotFound {
            town: township.to_string(),
            available: outcome.available,
        });
    }
    debug!("Township selected: {township}");
    Ok(())
}

/// Set a plain input by placeholder, with a scope-notified JS fallback.
async fn fill_input_by_placeholder(session: &Session, placeholder: &str, value: &str) -> Result<()> {
    let selector = format!("input[placeholder='{placeholder}']");
    match session.page().find_element(&selector).await {
        Ok(input) => {
            let _ = input.scroll_into_view().await;
            session
                .eval(&format!(
                    r#"(() => {{
                        const i = document.querySelector({sel});
                        if (i) i.value = '';
                    }})()"#,
                    sel = js_string(&selector)
                ))
                .await?;
            input.type_str(value).await?;
            Ok(())
        }
        Err(e) => {
            warn!("{placeholder} input interaction failed, trying JS: {e}");
            session
                .eval(&format!(
                    r#"(() => {{
                        const el = document.querySelector({sel});
                        if (el) {{
                            el.value = {val};
                            angular.element(el).triggerHandler('input');
                        }}
                    }})()"#,
                    sel = js_string(&selector),
                    val = js_string(value)
                ))
                .await
        }
    }
}

/// Fill the Town/Lot/Block form end to end (township, lot, block, optional
/// party name, date range, all-types checkbox) and trigger the search.
pub async fn fill_town_lot_block_form(session: &Session, criteria: &SearchCriteria) -> Result<()> {
    let township = criteria
        .township
        .as_deref()
        .ok_or_else(|| ScrapeError::ElementNotFound("township is required".into()))?;
    select_township(session, township).await?;

    if let Some(lot) = criteria.lot.as_deref() {
        fill_input_by_placeholder(session, "Lot", lot).await?;
    }
    if let Some(block) = criteria.block.as_deref() {
        fill_input_by_placeholder(session, "Block", block).await?;
    }

    select_all_doc_types(session).await;

    if criteria.party_name.is_empty() {
        debug!("party_name is empty, skipping party name field");
    } else {
        fill_named_input(session, "partyName", &criteria.party_name).await?;
    }

    fill_dates(session, &criteria.from_date, &criteria.to_date).await;

    submit_town_lot_block(session).await?;
    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
    Ok(())
}

async fn fill_named_input(session: &Session, name: &str, value: &str) -> Result<()> {
    session
        .eval(&format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (el) {{
                    el.scrollIntoView({{block: 'center'}});
                    el.value = {val};
                    angular.element(el).triggerHandler('input');
                    angular.element(el).triggerHandler('change');
                }}
            }})()"#,
            sel = js_string(&format!("input[name='{name}']")),
            val = js_string(value)
        ))
        .await
}

async fn fill_dates(session: &Session, from_date: &str, to_date: &str) {
    for (name, value) in [("fromdate", from_date), ("todate", to_date)] {
        if let Err(e) = fill_named_input(session, name, value).await {
            warn!("Date range error ({name}): {e}");
        }
    }
}

/// Trigger the party search: call the framework's search function through
/// its scope when reachable, and unconditionally also click the visible
/// Search button. The portal's search is read-only, so a double submit is
/// harmless.
pub async fn submit_party_search(session: &Session) -> Result<()> {
    info!("Executing search");
    session
        .eval(
            r#"(() => {
                const searchBtn = document.querySelector("button[ng-click*='runSearch']");
                if (searchBtn) {
                    const scope = angular.element(searchBtn).scope();
                    if (scope) {
                        scope.$apply(function() { scope.runSearch(true); });
                    } else {
                        searchBtn.click();
                    }
                }
            })()"#,
        )
        .await?;

    // Redundant physical click in case the scope trigger was a no-op.
    session
        .eval(
            r#"(() => {
                const btn = Array.from(document.querySelectorAll('button'))
                    .find(b => b.innerText.includes('Search') && b.offsetWidth > 0);
                if (btn) btn.click();
            })()"#,
        )
        .await?;
    Ok(())
}

async fn submit_town_lot_block(session: &Session) -> Result<()> {
    info!("Executing search");
    session
        .eval(
            r#"(() => {
                const btn = document.querySelector("button[ng-click='runSearch(true)']");
                if (btn) {
                    btn.scrollIntoView({block: 'center'});
                    btn.click();
                } else {
                    const any = document.querySelector("button[ng-click*='runSearch']");
                    if (any) angular.element(any).scope().runSearch(true);
                }
            })()"#,
        )
        .await
}

/// Dismiss the results-limit notice modal when it appears.
pub async fn dismiss_notice_modal(session: &Session) {
    let found = wait::wait_until(MODAL_WAIT, "notice modal", || async move {
        let clicked: bool = session
            .eval_value(
                r#"(() => {
                    const ok = document.querySelector("button[ng-click='modal_ok()']");
                    if (!ok || ok.offsetWidth === 0) return false;
                    ok.click();
                    return true;
                })()"#,
            )
            .await?;
        Ok(clicked.then_some(()))
    })
    .await;

    if found.is_ok() {
        info!("Notice modal detected and dismissed");
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
}

/// What submitting a search resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Results,
    NoRecords,
    TimedOut,
}

/// Wait for the result grid: actionable rows, an explicit "no records"
/// marker, or the deadline — whichever comes first.
pub async fn await_results(session: &Session) -> SearchOutcome {
    // Let any loading spinner clear first; best effort.
    let spinner_gone = WaitPolicy::new(
        std::time::Duration::from_secs(5),
        std::time::Duration::from_millis(250),
    );
    let _ = wait::wait_until(spinner_gone, "spinner", || async move {
        let visible: bool = session
            .eval_value(
                r#"(() => {
                    const s = document.querySelector('.ajax-loader');
                    return !!(s && s.offsetWidth > 0);
                })()"#,
            )
            .await?;
        Ok((!visible).then_some(()))
    })
    .await;

    info!("Waiting for results...");
    let outcome = wait::wait_until(RESULTS_WAIT, "results or no-records marker", || async move {
        let state: String = session
            .eval_value(
                r#"(() => {
                    const rows = document.querySelectorAll("button[ng-click*='fetchDocument']");
                    if (rows.length > 0) return "results";
                    const text = document.body ? document.body.innerText : '';
                    if (text.includes('No records found')) return "no_records";
                    return "pending";
                })()"#,
            )
            .await?;
        Ok(match state.as_str() {
            "results" => Some(SearchOutcome::Results),
            "no_records" => Some(SearchOutcome::NoRecords),
            _ => None,
        })
    })
    .await;

    match outcome {
        Ok(o) => {
            info!("Results or message detected");
            o
        }
        Err(_) => {
            warn!("Search timed out waiting for results");
            SearchOutcome::TimedOut
        }
    }
}
