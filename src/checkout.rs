//! Guest checkout flow
//!
//! Home, product selection and add-to-cart are critical: nothing after them
//! can work if they fail. Region, commune and the shipping-method button only
//! exist on the home-delivery branch and are skipped when store pickup hides
//! them.

use action_flow::{Applicability, FlowDefinition, Interaction, Step};
use action_primitives::{PageCondition, SelectBy, WaitUntil};
use storeprobe_national_id::Rut;

use crate::app_settings::{CheckoutData, Config, Timeouts};

pub const FLOW_ID: &str = "guest_checkout";
pub const FLOW_NAME: &str = "Guest checkout";
pub const FINAL_CHECK: &str = "Guest checkout flow completed";

pub mod selectors {
    pub const BODY: &str = "body";
    pub const FIRST_PRODUCT: &str = "#home-sub > div > div > div > ul > li:nth-child(1) > a > img";
    pub const PRODUCT_PATH: &str = "/products/";
    pub const COLOR: &str = "#color > li > a";
    pub const CART_OVERLAY: &str = "#inside-product-cart-form > div.col-sm-12 > div.fixed-atc-wrapper";
    pub const ADD_TO_CART: &str = "button#add-to-cart-button";
    pub const GO_TO_CART: &str = "#added-product-summarize > div:nth-child(2) > div:nth-child(2) > div > a";
    pub const CHECKOUT_LINK: &str = "#checkout-link";
    pub const EMAIL: &str = "#order_email";
    pub const EMAIL_CONFIRM: &str = "#order_email_confirmation";
    pub const GUEST_CONTINUE: &str = "#checkout_form_registration > button";
    pub const RUT: &str = "#order_bill_address_attributes_run";
    pub const FIRST_NAME: &str = "#order_bill_address_attributes_firstname";
    pub const LAST_NAME: &str = "#order_bill_address_attributes_lastname";
    pub const PICKUP_TOGGLE: &str = "#click-go-shipping";
    pub const PICKUP_STORE: &str = "#order_pickup_location_id";
    pub const REGION: &str = "#order_bill_address_attributes_state_id";
    pub const COMMUNE: &str = "#order_bill_address_attributes_county_id";
    pub const ADDRESS: &str = "#order_bill_address_attributes_address1";
    pub const PHONE: &str = "#order_bill_address_attributes_phone";
    pub const PHONE_CONFIRM: &str = "#order_bill_address_attributes_phone_confirmation";
    pub const SAVE_ADDRESS: &str =
        "#checkout_form_address > div.form-buttons > div > div.col-sm-6 > input";
    pub const SHIPPING_METHOD: &str = "#checkout_form_delivery > div.form-buttons > input";
}

/// Step names in execution order
pub const STEP_NAMES: [&str; 15] = [
    "home",
    "select_first_product",
    "select_color",
    "add_to_cart",
    "go_to_cart",
    "begin_checkout",
    "guest_email",
    "identity",
    "pickup_toggle",
    "pickup_store",
    "region",
    "commune",
    "address",
    "save_address",
    "shipping_method",
];

/// Build the flow for one run; `rut` is typed into the identity form
pub fn guest_checkout(config: &Config, rut: &Rut) -> FlowDefinition {
    build(config.base_url(), &config.checkout, &config.timeouts, rut)
        .with_viewport(config.browser.viewport)
}

fn build(base_url: &str, data: &CheckoutData, t: &Timeouts, rut: &Rut) -> FlowDefinition {
    use selectors::*;

    let wait = |selector: &str| Interaction::wait_visible_within(selector, t.element_ms);
    let step = |step: Step| {
        step.with_timeout(t.element_ms)
            .with_action_timeout(t.action_ms)
            .with_settle(t.settle_ms)
    };

    let home = format!("{}/", base_url);
    let steps = vec![
        Step::critical("home", "Home page loaded and body visible")
            .with_timeout(t.element_ms)
            .with_action_timeout(t.action_ms)
            .then(Interaction::goto(home.clone(), WaitUntil::Load, t.navigation_ms))
            // a redirect away from the storefront root fails the step
            .then(Interaction::wait_until_within(
                PageCondition::UrlIs(home),
                t.url_change_ms,
            ))
            .then(Interaction::wait_visible_within(BODY, t.body_ms))
            .with_settle(t.settle_ms * 2),
        step(Step::critical(
            "select_first_product",
            "First product selected and product page opened",
        ))
        .then(wait(FIRST_PRODUCT))
        .then(Interaction::click(FIRST_PRODUCT))
        .then(Interaction::wait_until_within(
            PageCondition::UrlContains(PRODUCT_PATH.to_string()),
            t.url_change_ms,
        ))
        .with_settle(t.product_settle_ms),
        step(Step::best_effort("select_color", "Colour selected"))
            .then(wait(COLOR))
            .then(Interaction::click(COLOR)),
        step(Step::critical("add_to_cart", "Add to cart clicked"))
            .then(wait(CART_OVERLAY))
            .then(Interaction::click_first_actionable(CART_OVERLAY, ADD_TO_CART)),
        step(Step::best_effort("go_to_cart", "Go to cart clicked"))
            .then(wait(GO_TO_CART))
            .then(Interaction::click(GO_TO_CART)),
        step(Step::best_effort("begin_checkout", "Place order clicked"))
            .then(wait(CHECKOUT_LINK))
            .then(Interaction::click(CHECKOUT_LINK)),
        step(Step::best_effort("guest_email", "Continue as guest clicked"))
            .then(wait(EMAIL))
            .then(Interaction::fill(EMAIL, data.email.clone()))
            .then(wait(EMAIL_CONFIRM))
            .then(Interaction::fill(EMAIL_CONFIRM, data.email.clone()))
            .then(wait(GUEST_CONTINUE))
            .then(Interaction::click(GUEST_CONTINUE)),
        step(Step::best_effort("identity", "Identity fields filled"))
            .then(wait(RUT))
            .then(Interaction::fill(RUT, rut.to_string()))
            .then(wait(FIRST_NAME))
            .then(Interaction::fill(FIRST_NAME, data.first_name.clone()))
            .then(wait(LAST_NAME))
            .then(Interaction::fill(LAST_NAME, data.last_name.clone()))
            .with_settle(0),
        step(Step::best_effort("pickup_toggle", "Store pickup chosen"))
            .then(wait(PICKUP_TOGGLE))
            .then(Interaction::click(PICKUP_TOGGLE))
            .with_settle(0),
        step(Step::best_effort("pickup_store", "Pickup store selected"))
            .then(wait(PICKUP_STORE))
            .then(Interaction::select(
                PICKUP_STORE,
                SelectBy::Index(data.pickup_store_index),
            ))
            .with_settle(0),
        step(Step::optional(
            "region",
            "Region selected or not required",
            Applicability::Enabled(REGION.to_string()),
        ))
        .then(wait(REGION))
        .then(Interaction::wait_until_within(
            PageCondition::HasValue {
                selector: REGION.to_string(),
            },
            t.element_ms,
        ))
        .with_settle(0),
        step(Step::optional(
            "commune",
            "Commune selected or not required",
            Applicability::Enabled(COMMUNE.to_string()),
        ))
        .then(Interaction::wait_attached(COMMUNE))
        .then(Interaction::wait_until_within(
            PageCondition::OptionsLoaded {
                selector: COMMUNE.to_string(),
                min_options: 1,
            },
            t.options_ms,
        ))
        .then(Interaction::select_first_valued(COMMUNE))
        .with_settle(0),
        step(Step::best_effort("address", "Address and phone filled"))
            .then(wait(ADDRESS))
            .then(Interaction::fill(ADDRESS, data.address.clone()))
            .then(wait(PHONE))
            .then(Interaction::fill(PHONE, data.phone.clone()))
            .then(wait(PHONE_CONFIRM))
            .then(Interaction::fill(PHONE_CONFIRM, data.phone.clone()))
            .with_settle(0),
        step(Step::best_effort("save_address", "Save and continue clicked"))
            .then(wait(SAVE_ADDRESS))
            .then(Interaction::click(SAVE_ADDRESS)),
        step(Step::optional(
            "shipping_method",
            "Shipping method confirmed or not required",
            Applicability::Rendered(SHIPPING_METHOD.to_string()),
        ))
        .then(wait(SHIPPING_METHOD))
        .then(Interaction::ensure_enabled(SHIPPING_METHOD))
        .then(Interaction::click(SHIPPING_METHOD)),
    ];

    FlowDefinition::new(FLOW_ID, FLOW_NAME, steps)
        .with_description("Guest purchase from the home page to the shipping method")
        .with_final_check(FINAL_CHECK)
}
