//! Applicability checks for optional steps
//!
//! Some steps only exist on certain branches of the checkout (store pickup
//! hides the region and commune selectors and the shipping-method button).
//! The resolver inspects the page without mutating it and answers whether the
//! step applies at all.

use action_primitives::{ActionError, PagePort};
use async_trait::async_trait;
use tracing::debug;

use crate::types::Applicability;

#[async_trait]
pub trait ApplicabilityResolver: Send + Sync {
    async fn is_applicable(
        &self,
        applicability: &Applicability,
        page: &dyn PagePort,
    ) -> Result<bool, ActionError>;
}

/// Resolver backed by `PagePort::probe`
#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeResolver;

#[async_trait]
impl ApplicabilityResolver for ProbeResolver {
    async fn is_applicable(
        &self,
        applicability: &Applicability,
        page: &dyn PagePort,
    ) -> Result<bool, ActionError> {
        let probe = page.probe(applicability.selector()).await?;
        let applicable = match applicability {
            Applicability::Enabled(_) => probe.exists && probe.enabled,
            Applicability::Rendered(_) => probe.exists && probe.rendered,
            Applicability::Actionable(_) => probe.is_actionable(),
        };
        debug!(
            selector = applicability.selector(),
            exists = probe.exists,
            enabled = probe.enabled,
            rendered = probe.rendered,
            applicable,
            "resolved step applicability"
        );
        Ok(applicable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::{ScriptedElement, ScriptedPage};

    fn page() -> ScriptedPage {
        ScriptedPage::new("about:blank")
            .with_element("#region", ScriptedElement::visible())
            .with_element("#county", ScriptedElement::disabled())
            .with_element("#delivery", ScriptedElement::hidden())
    }

    async fn check(applicability: Applicability) -> bool {
        ProbeResolver
            .is_applicable(&applicability, &page())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn absent_element_is_not_applicable() {
        assert!(!check(Applicability::Enabled("#missing".into())).await);
        assert!(!check(Applicability::Rendered("#missing".into())).await);
        assert!(!check(Applicability::Actionable("#missing".into())).await);
    }

    #[tokio::test]
    async fn disabled_element_is_not_applicable() {
        assert!(!check(Applicability::Enabled("#county".into())).await);
        assert!(!check(Applicability::Actionable("#county".into())).await);
        assert!(check(Applicability::Rendered("#county".into())).await);
    }

    #[tokio::test]
    async fn zero_dimension_element_is_not_applicable() {
        assert!(!check(Applicability::Rendered("#delivery".into())).await);
        assert!(!check(Applicability::Actionable("#delivery".into())).await);
        assert!(check(Applicability::Enabled("#delivery".into())).await);
    }

    #[tokio::test]
    async fn probing_does_not_mutate() {
        let page = page();
        ProbeResolver
            .is_applicable(&Applicability::Actionable("#region".into()), &page)
            .await
            .unwrap();
        assert_eq!(page.actions_on("#region"), 0);
    }

    #[tokio::test]
    async fn probe_error_propagates() {
        let page = ScriptedPage::new("about:blank").failing("#region");
        let result = ProbeResolver
            .is_applicable(&Applicability::Enabled("#region".into()), &page)
            .await;
        assert!(result.is_err());
    }
}
