//! Portal-specific workflow: navigation, form filling, result harvesting and
//! the index snapshot export.
//!
//! The target site is a client-rendered single-page application with no
//! documented API. Everything here drives it through the DOM and through its
//! client-side framework bindings, with a fallback at each step.

pub mod doc_types;
pub mod export;
pub mod form;
pub mod harvest;

use tracing::{debug, info, warn};

use crate::browser::Session;
use crate::error::{Result, ScrapeError};
use crate::wait::{self, WaitPolicy, TAB_RETRY};

/// Which search tab the workflow drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Party,
    TownLotBlock,
}

/// Moves the session `Unopened -> Loaded -> ModeSelected`.
pub struct Navigator<'a> {
    session: &'a Session,
}

impl<'a> Navigator<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Load the portal entry page and give the client framework time to boot.
    pub async fn open(&self, site_url: &str) -> Result<()> {
        info!("Opening portal: {site_url}");
        self.session.goto(site_url).await?;
        wait::settle().await;
        Ok(())
    }

    pub async fn select_mode(&self, mode: SearchMode) -> Result<()> {
        match mode {
            SearchMode::Party => self.select_party_mode().await,
            SearchMode::TownLotBlock => self.select_town_lot_block_mode().await,
        }
    }

    /// Make the party-name input visible, switching tabs if necessary.
    ///
    /// The party input may already be on screen; otherwise the "Party" tab is
    /// clicked through the framework's tab list, falling back to a plain
    /// anchor click, and the render cycle is given time to settle before
    /// re-checking. Three failed rounds is terminal: the search is aborted
    /// with no partial submission.
    async fn select_party_mode(&self) -> Result<()> {
        let session = self.session;
        let found = wait::retry(TAB_RETRY, "locate Party Name input", |_attempt| async move {
            if party_input_visible(session).await? {
                debug!("Party input is visible");
                return Ok(Some(()));
            }
            debug!("Party input not visible, clicking Party tab");
            click_party_tab(session).await?;
            Ok(None)
        })
        .await;

        match found {
            Some(()) => Ok(()),
            None => {
                warn!("Failed to locate Party Name input after {} attempts", TAB_RETRY.max_attempts);
                Err(ScrapeError::FormUnavailable)
            }
        }
    }

    /// Click the Town/Lot/Block tab and wait for the town dropdown to carry
    /// more than its placeholder option.
    async fn select_town_lot_block_mode(&self) -> Result<()> {
        let clicked: bool = self
            .session
            .eval_value(
                r#"(() => {
                    const anchors = Array.from(document.querySelectorAll('a'));
                    const tab = anchors.find(a => a.innerText.includes('Town/Lot/Block'));
                    if (!tab) return false;
                    tab.click();
                    return true;
                })()"#,
            )
            .await?;
        if !clicked {
            warn!("Town/Lot/Block tab not found; assuming the search page is already active");
        }
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        let session = self.session;
        let policy = WaitPolicy::new(
            std::time::Duration::from_secs(25),
            std::time::Duration::from_millis(500),
        );
        let populated = wait::wait_until(policy, "town dropdown options", || async move {
            let count: u32 = session
                .eval_value(
                    r#"(() => {
                        const sel = document.querySelector(
                            "select[ng-model='documentService.SearchCriteria.searchCommonTown']");
                        return sel ? sel.options.length : 0;
                    })()"#,
                )
                .await?;
            Ok((count > 1).then_some(()))
        })
        .await;

        if populated.is_err() {
            warn!("Township dropdown options might not have loaded");
        }
        Ok(())
    }
}

async fn party_input_visible(session: &Session) -> Result<bool> {
    session
        .eval_value(
            r#"(() => {
                const inputs = Array.from(
                    document.querySelectorAll("input[placeholder='Party Name']"));
                return inputs.some(i => i.offsetWidth > 0 && i.offsetHeight > 0);
            })()"#,
        )
        .await
}

async fn click_party_tab(session: &Session) -> Result<()> {
    let clicked: bool = session
        .eval_value(
            r#"(() => {
                const tabs = document.querySelectorAll('ul.nav-tabs li a');
                for (const tab of tabs) {
                    if (tab.innerText.includes('Party')) {
                        tab.click();
                        return true;
                    }
                }
                return false;
            })()"#,
        )
        .await?;
    if !clicked {
        // Fallback: any anchor mentioning Party.
        session
            .eval(
                r#"(() => {
                    const a = Array.from(document.querySelectorAll('a'))
                        .find(a => a.innerText.includes('Party'));
                    if (a) a.click();
                })()"#,
            )
            .await?;
    }
    Ok(())
}
