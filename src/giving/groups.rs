use crate::error::{Error, Result};

/// Default boundary between the two earnings groups. Illustrative only.
pub const DEFAULT_EARNINGS_BOUNDARY: f64 = 50_000.0;
pub const DEFAULT_PRICE_ELASTICITIES: [f64; 2] = [-0.1, -0.4];
pub const DEFAULT_INCOME_ELASTICITY: f64 = 0.1;

/// A partition of wage income into half-open intervals `[lo, hi)`.
///
/// `boundaries` are the interior cut points; `n` boundaries give `n + 1`
/// groups, the first starting at -inf and the last ending at +inf.
#[derive(Debug, Clone, PartialEq)]
pub struct EarningsGroups {
    boundaries: Vec<f64>,
}

impl Default for EarningsGroups {
    fn default() -> Self {
        EarningsGroups {
            boundaries: vec![DEFAULT_EARNINGS_BOUNDARY],
        }
    }
}

impl EarningsGroups {
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if boundaries.iter().any(|b| !b.is_finite()) {
            return Err(Error::InputData(
                "earnings group boundaries must be finite".into(),
            ));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InputData(
                "earnings group boundaries must be strictly ascending".into(),
            ));
        }
        Ok(EarningsGroups { boundaries })
    }

    pub fn len(&self) -> usize {
        self.boundaries.len() + 1
    }

    /// Index of the group containing `wages`.
    pub fn assign(&self, wages: f64) -> usize {
        self.boundaries.partition_point(|b| *b <= wages)
    }

    pub fn bounds(&self, group: usize) -> (f64, f64) {
        let lo = match group {
            0 => f64::NEG_INFINITY,
            g => self.boundaries[g - 1],
        };
        let hi = self
            .boundaries
            .get(group)
            .copied()
            .unwrap_or(f64::INFINITY);
        (lo, hi)
    }

    pub fn label(&self, group: usize) -> String {
        let (lo, hi) = self.bounds(group);
        format!("[{lo}, {hi})")
    }
}

/// Behavioral assumptions applied per earnings group.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticityAssumptions {
    groups: EarningsGroups,
    price: Vec<f64>,
    income: f64,
}

impl Default for ElasticityAssumptions {
    fn default() -> Self {
        ElasticityAssumptions {
            groups: EarningsGroups::default(),
            price: DEFAULT_PRICE_ELASTICITIES.to_vec(),
            income: DEFAULT_INCOME_ELASTICITY,
        }
    }
}

impl ElasticityAssumptions {
    pub fn new(groups: EarningsGroups, price: Vec<f64>, income: f64) -> Result<Self> {
        if price.len() != groups.len() {
            return Err(Error::InputData(format!(
                "{} earnings groups need {} price elasticities, got {}",
                groups.len(),
                groups.len(),
                price.len()
            )));
        }
        if price.iter().chain([&income]).any(|e| !e.is_finite()) {
            return Err(Error::InputData("elasticities must be finite".into()));
        }
        Ok(ElasticityAssumptions {
            groups,
            price,
            income,
        })
    }

    pub fn groups(&self) -> &EarningsGroups {
        &self.groups
    }

    pub fn price_elasticity(&self, group: usize) -> f64 {
        self.price[group]
    }

    pub fn income_elasticity(&self) -> f64 {
        self.income
    }
}
