//! Scripted storefront for rehearsals
//!
//! Models the guest checkout pages as one `ScriptedPage`. On the delivery
//! branch every step applies. On the pickup branch choosing store pickup
//! disables region and commune and hides the shipping-method button.

use action_primitives::{
    ActionError, BrowserPort, Effect, ElementProbe, PagePort, ScriptedElement, ScriptedPage,
    SelectOptionInfo,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::checkout::selectors::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Branch {
    #[default]
    Delivery,
    Pickup,
}

/// Builder for the scripted storefront
#[derive(Debug, Clone)]
pub struct Storefront {
    base_url: String,
    branch: Branch,
    overlay_visible: bool,
    lcp_ms: Option<u64>,
    failing: Vec<String>,
}

impl Storefront {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            branch: Branch::Delivery,
            overlay_visible: true,
            lcp_ms: None,
            failing: Vec::new(),
        }
    }

    pub fn branch(mut self, branch: Branch) -> Self {
        self.branch = branch;
        self
    }

    /// The add-to-cart overlay never appears
    pub fn without_cart_overlay(mut self) -> Self {
        self.overlay_visible = false;
        self
    }

    /// Pages report this Largest Contentful Paint
    pub fn with_lcp(mut self, lcp_ms: u64) -> Self {
        self.lcp_ms = Some(lcp_ms);
        self
    }

    /// Every call touching `selector` fails
    pub fn failing(mut self, selector: impl Into<String>) -> Self {
        self.failing.push(selector.into());
        self
    }

    pub fn build(&self) -> ScriptedPage {
        let url = |path: &str| format!("{}{}", self.base_url, path);
        let overlay = if self.overlay_visible {
            ScriptedElement::visible()
        } else {
            ScriptedElement::hidden()
        };

        let mut page = ScriptedPage::new("about:blank")
            .with_element(BODY, ScriptedElement::visible())
            .with_element(FIRST_PRODUCT, ScriptedElement::visible())
            .on_interact(FIRST_PRODUCT, Effect::Navigate(url("/products/first-listed")))
            .with_element(COLOR, ScriptedElement::visible())
            .with_element(CART_OVERLAY, overlay)
            // a sticky duplicate of the button stays hidden
            .with_candidates(
                CART_OVERLAY,
                ADD_TO_CART,
                vec![ElementProbe::hidden(), ElementProbe::actionable()],
            )
            .with_element(GO_TO_CART, ScriptedElement::hidden())
            .on_interact(ADD_TO_CART, Effect::Show(GO_TO_CART.to_string()))
            .on_interact(GO_TO_CART, Effect::Navigate(url("/cart")))
            .with_element(CHECKOUT_LINK, ScriptedElement::visible())
            .on_interact(CHECKOUT_LINK, Effect::Navigate(url("/checkout/registration")))
            .with_element(EMAIL, ScriptedElement::visible())
            .with_element(EMAIL_CONFIRM, ScriptedElement::visible())
            .with_element(GUEST_CONTINUE, ScriptedElement::visible())
            .on_interact(GUEST_CONTINUE, Effect::Navigate(url("/checkout/address")))
            .with_element(RUT, ScriptedElement::visible())
            .with_element(FIRST_NAME, ScriptedElement::visible())
            .with_element(LAST_NAME, ScriptedElement::visible())
            .with_element(PICKUP_TOGGLE, ScriptedElement::visible())
            .with_element(
                PICKUP_STORE,
                ScriptedElement::visible().with_options(vec![
                    SelectOptionInfo::new("", "Choose a store"),
                    SelectOptionInfo::new("7", "Costanera Center"),
                    SelectOptionInfo::new("9", "Parque Arauco"),
                ]),
            )
            .with_element(
                REGION,
                ScriptedElement::visible()
                    .with_value("13")
                    .with_options(vec![
                        SelectOptionInfo::new("", "Region"),
                        SelectOptionInfo::new("13", "Metropolitana"),
                    ]),
            )
            .with_element(
                COMMUNE,
                ScriptedElement::visible().with_options(vec![
                    SelectOptionInfo::new("", "Commune"),
                    SelectOptionInfo::new("13101", "Santiago"),
                    SelectOptionInfo::new("13114", "Las Condes"),
                ]),
            )
            .with_element(ADDRESS, ScriptedElement::visible())
            .with_element(PHONE, ScriptedElement::visible())
            .with_element(PHONE_CONFIRM, ScriptedElement::visible())
            .with_element(SAVE_ADDRESS, ScriptedElement::visible())
            .on_interact(SAVE_ADDRESS, Effect::Navigate(url("/checkout/delivery")))
            .with_element(SHIPPING_METHOD, ScriptedElement::visible())
            .on_interact(SHIPPING_METHOD, Effect::Navigate(url("/checkout/payment")));

        if self.branch == Branch::Pickup {
            page = page
                .on_interact(
                    PICKUP_TOGGLE,
                    Effect::Insert(REGION.to_string(), ScriptedElement::disabled()),
                )
                .on_interact(
                    PICKUP_TOGGLE,
                    Effect::Insert(COMMUNE.to_string(), ScriptedElement::disabled()),
                )
                .on_interact(PICKUP_TOGGLE, Effect::Hide(SHIPPING_METHOD.to_string()));
        }

        if let Some(lcp_ms) = self.lcp_ms {
            page = page.with_lcp(lcp_ms);
        }
        for selector in &self.failing {
            page = page.failing(selector.clone());
        }
        page
    }
}

/// Hands out a fresh storefront page per run
pub struct StorefrontBrowser {
    storefront: Storefront,
    pages: Mutex<Vec<Arc<ScriptedPage>>>,
}

impl StorefrontBrowser {
    pub fn new(storefront: Storefront) -> Self {
        Self {
            storefront,
            pages: Mutex::new(Vec::new()),
        }
    }

    /// Pages opened so far, oldest first
    pub fn pages(&self) -> Vec<Arc<ScriptedPage>> {
        self.pages.lock().clone()
    }
}

#[async_trait]
impl BrowserPort for StorefrontBrowser {
    async fn new_page(&self) -> Result<Arc<dyn PagePort>, ActionError> {
        let page = Arc::new(self.storefront.build());
        self.pages.lock().push(page.clone());
        Ok(page)
    }
}
