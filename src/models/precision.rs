use crate::models::numeric::parse_decimal;
use crate::{Error, Result};
use rust_decimal::Decimal;

const MAX_DIGITS: u32 = 28;

/// Step for an upstream "digits after the decimal point" precision, `4 -> 0.0001`.
pub fn step_from_digits(digits: u32) -> Result<Decimal> {
    if digits > MAX_DIGITS {
        return Err(Error::InvalidInput(format!(
            "precision {digits} exceeds {MAX_DIGITS} digits"
        )));
    }
    Ok(Decimal::new(1, digits))
}

/// Normalizes an upstream increment such as `"0.00010000"` into a power-of-ten step.
pub fn step_from_increment(text: &str) -> Result<Decimal> {
    let step = parse_decimal(text)?.normalize();
    if !is_power_of_ten(step) {
        return Err(Error::InvalidInput(format!(
            "increment {text:?} is not a positive power of ten"
        )));
    }
    Ok(step)
}

pub fn is_power_of_ten(value: Decimal) -> bool {
    if value <= Decimal::ZERO {
        return false;
    }
    let normalized = value.normalize();
    let mantissa = normalized.mantissa();
    if normalized.scale() > 0 {
        return mantissa == 1;
    }
    let mut rest = mantissa;
    while rest > 1 && rest % 10 == 0 {
        rest /= 10;
    }
    rest == 1
}

pub fn is_multiple_of(value: Decimal, step: Decimal) -> bool {
    if step <= Decimal::ZERO {
        return false;
    }
    value
        .checked_rem(step)
        .is_some_and(|remainder| remainder.is_zero())
}

pub fn floor_to_step(value: Decimal, step: Decimal) -> Result<Decimal> {
    snap_to_step(value, step, Decimal::floor)
}

pub fn ceil_to_step(value: Decimal, step: Decimal) -> Result<Decimal> {
    snap_to_step(value, step, Decimal::ceil)
}

/// A zero or negative step leaves `value` as is. Fails when `value / step`
/// does not fit in a `Decimal`.
fn snap_to_step(value: Decimal, step: Decimal, round: fn(&Decimal) -> Decimal) -> Result<Decimal> {
    if step <= Decimal::ZERO {
        return Ok(value);
    }
    value
        .checked_div(step)
        .map(|steps| round(&steps))
        .and_then(|steps| steps.checked_mul(step))
        .map(|snapped| snapped.normalize())
        .ok_or_else(|| Error::InvalidInput(format!("{value} does not fit a step of {step}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).expect("decimal")
    }

    #[test]
    fn digits_become_steps() {
        assert_eq!(step_from_digits(4).expect("4"), dec("0.0001"));
        assert_eq!(step_from_digits(0).expect("0"), Decimal::ONE);
        assert!(step_from_digits(40).is_err());
    }

    #[test]
    fn increments_are_normalized() {
        assert_eq!(step_from_increment("0.00010000").expect("step"), dec("0.0001"));
        assert_eq!(step_from_increment("10.000").expect("step"), dec("10"));
        assert!(step_from_increment("0.00025").is_err());
        assert!(step_from_increment("0").is_err());
    }

    #[test]
    fn floors_and_ceils() {
        let step = dec("0.01");
        assert_eq!(floor_to_step(dec("1.239"), step).expect("floor"), dec("1.23"));
        assert_eq!(ceil_to_step(dec("1.231"), step).expect("ceil"), dec("1.24"));
        assert!(is_multiple_of(dec("1.23"), step));
        assert!(!is_multiple_of(dec("1.235"), step));
    }

    #[test]
    fn overflowing_quotients_are_errors() {
        let finest = step_from_digits(28).expect("28 digits");
        assert!(floor_to_step(dec("10"), finest).is_err());
        assert!(ceil_to_step(dec("100000000000"), Decimal::new(1, 18)).is_err());
        assert_eq!(floor_to_step(dec("0.5"), finest).expect("fits"), dec("0.5"));
    }
}
