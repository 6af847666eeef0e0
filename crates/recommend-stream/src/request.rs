use crate::errors::RecommendError;

/// Upper bound on product ids accepted by the recommendation endpoint.
pub const MAX_PRODUCT_IDS: usize = 10;

/// Validated request body sent to the recommendation endpoint.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecommendRequest {
    /// Selected products, in selection order.
    pub product_ids: Vec<String>,
    /// Optional free-text context; omitted from the body when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,
}

impl RecommendRequest {
    /// Validates inputs and builds a request.
    ///
    /// A blank `user_query` is treated as absent.
    pub fn new<I, S>(product_ids: I, user_query: Option<String>) -> Result<Self, RecommendError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let product_ids: Vec<String> = product_ids.into_iter().map(Into::into).collect();
        if product_ids.is_empty() {
            return Err(RecommendError::invalid_request(
                "at least one product id is required",
            ));
        }
        if product_ids.len() > MAX_PRODUCT_IDS {
            return Err(RecommendError::invalid_request(format!(
                "at most {MAX_PRODUCT_IDS} product ids are allowed, got {}",
                product_ids.len()
            )));
        }
        if product_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(RecommendError::invalid_request(
                "product ids must not be empty",
            ));
        }

        Ok(Self {
            product_ids,
            user_query: user_query.filter(|q| !q.trim().is_empty()),
        })
    }
}
