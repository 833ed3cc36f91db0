use crate::error::{Error, Result};

/// Inputs of the quantity response model, one slice entry per filing unit.
#[derive(Debug, Clone, Copy)]
pub struct ResponseInputs<'a> {
    pub quantity: &'a [f64],
    pub price_elasticity: &'a [f64],
    pub aftertax_price1: &'a [f64],
    pub aftertax_price2: &'a [f64],
    pub income_elasticity: &'a [f64],
    pub aftertax_income1: &'a [f64],
    pub aftertax_income2: &'a [f64],
}

/// Change in `quantity` implied by constant price and income elasticities.
///
/// `response = (e_p * (p2/p1 - 1) + e_i * (a2/a1 - 1)) * quantity`, with
/// after-tax incomes below one dollar raised to one dollar. The response is in
/// the same units as `quantity`.
pub fn quantity_response(inputs: ResponseInputs<'_>) -> Result<Vec<f64>> {
    let n = inputs.quantity.len();
    let lengths = [
        ("price_elasticity", inputs.price_elasticity.len()),
        ("aftertax_price1", inputs.aftertax_price1.len()),
        ("aftertax_price2", inputs.aftertax_price2.len()),
        ("income_elasticity", inputs.income_elasticity.len()),
        ("aftertax_income1", inputs.aftertax_income1.len()),
        ("aftertax_income2", inputs.aftertax_income2.len()),
    ];
    if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n) {
        return Err(Error::Computation(format!(
            "{name} has {len} values, quantity has {n}"
        )));
    }

    let mut response = Vec::with_capacity(n);
    for i in 0..n {
        let p1 = inputs.aftertax_price1[i];
        let p2 = inputs.aftertax_price2[i];
        if p1 <= 0.0 {
            return Err(Error::Computation(format!(
                "baseline after-tax price must be positive (unit {i}: {p1})"
            )));
        }
        let pch_price = p2 / p1 - 1.0;
        let ati1 = inputs.aftertax_income1[i].max(1.0);
        let ati2 = inputs.aftertax_income2[i].max(1.0);
        let pch_income = ati2 / ati1 - 1.0;
        let elastic = inputs.price_elasticity[i] * pch_price
            + inputs.income_elasticity[i] * pch_income;
        response.push(elastic * inputs.quantity[i]);
    }
    Ok(response)
}
