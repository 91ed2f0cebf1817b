//! Pure arithmetic primitives on [`Number`].
//!
//! Every function here is total: any `INF` operand yields `INF`, and every
//! domain boundary (division by zero, negative roots, …) resolves to a
//! well-defined result instead of panicking. The [`crate::interp::Interpreter`]
//! dispatch table calls straight into this module; nothing here knows about
//! memory, operands, or programs.

use seqmine_arch::Number;

/// `a + b`.
#[must_use]
pub fn add(a: &Number, b: &Number) -> Number {
    a.clone() + b.clone()
}

/// `a - b`.
#[must_use]
pub fn sub(a: &Number, b: &Number) -> Number {
    a.clone() - b.clone()
}

/// "Truncated subtraction": `max(a - b, 0)`.
#[must_use]
pub fn trn(a: &Number, b: &Number) -> Number {
    max(&sub(a, b), &Number::zero())
}

/// `a * b`.
#[must_use]
pub fn mul(a: &Number, b: &Number) -> Number {
    a.clone() * b.clone()
}

/// Truncated-toward-zero integer division. `b = 0` maps to `INF`.
#[must_use]
pub fn div(a: &Number, b: &Number) -> Number {
    match (a.finite(), b.finite()) {
        (Some(a), Some(b)) => {
            if b.sign() == num_bigint::Sign::NoSign {
                Number::inf()
            } else {
                Number::from_bigint(a / b)
            }
        }
        _ => Number::inf(),
    }
}

/// Exact division: `a / b` when `b` divides `a`, else `a` unchanged.
/// `b = 0` maps to `a` (a no-op), matching the reference implementation.
#[must_use]
pub fn dif(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() {
        return Number::inf();
    }
    if *b == Number::zero() {
        return a.clone();
    }
    let d = div(a, b);
    if mul(b, &d) == *a {
        d
    } else {
        a.clone()
    }
}

/// Remainder with the sign of the dividend. `b = 0` maps to `INF`.
#[must_use]
pub fn modulo(a: &Number, b: &Number) -> Number {
    match (a.finite(), b.finite()) {
        (Some(a), Some(b)) => {
            if b.sign() == num_bigint::Sign::NoSign {
                Number::inf()
            } else {
                Number::from_bigint(a % b)
            }
        }
        _ => Number::inf(),
    }
}

/// Integer exponentiation by repeated squaring.
///
/// `0^0 = 1`, `0^positive = 0`, `0^negative = INF`, `1^x = 1`,
/// `(-1)^x = ±1` by parity of `x`, and for `|base| > 1`, `base^negative = 0`.
#[must_use]
pub fn pow(base: &Number, exp: &Number) -> Number {
    if base.is_inf() || exp.is_inf() {
        return Number::inf();
    }
    let zero = Number::zero();
    let one = Number::one();
    if *base == zero {
        return match exp.cmp(&zero) {
            std::cmp::Ordering::Greater => zero,
            std::cmp::Ordering::Equal => one,
            std::cmp::Ordering::Less => Number::inf(),
        };
    }
    if *base == one {
        return one;
    }
    if *base == Number::minus_one() {
        return if exp.odd() { Number::minus_one() } else { one };
    }
    if *exp < zero {
        return zero;
    }
    let mut r = one;
    let mut b = base.clone();
    let mut e = exp.clone();
    while r != Number::inf() && e != zero {
        if e.odd() {
            r = mul(&r, &b);
        }
        e = div(&e, &Number::two());
        if e != zero {
            b = mul(&b, &b);
            if b == Number::inf() {
                r = Number::inf();
            }
        }
    }
    r
}

/// Non-negative greatest common divisor. `gcd(0, 0) = 0`.
#[must_use]
pub fn gcd(a: &Number, b: &Number) -> Number {
    if *a == Number::zero() && *b == Number::zero() {
        return Number::zero();
    }
    if a.is_inf() || b.is_inf() {
        return Number::inf();
    }
    let mut aa = a.abs();
    let mut bb = b.abs();
    while bb != Number::zero() {
        let r = modulo(&aa, &bb);
        if r.is_inf() {
            return Number::inf();
        }
        aa = bb;
        bb = r;
    }
    aa
}

/// Strips all factors of `b` out of `a`: repeatedly exact-divides while `b`
/// evenly divides the running value. `b < 2` (or an `INF` operand) maps to
/// `INF`. Grounded on the mutation ordering in the reference miner's
/// operation-type rotation (`GCD` → `LEX` → `BIN`), which places it in the
/// same number-theoretic family as `gcd`/`bin`; the reference source this
/// spec was distilled from did not retain `Semantics::lex`'s body, so this
/// definition is this implementation's own resolution — see DESIGN.md.
#[must_use]
pub fn lex(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() || *b < Number::two() {
        return Number::inf();
    }
    let mut r = a.clone();
    loop {
        let d = dif(&r, b);
        if d == r {
            break;
        }
        r = d;
    }
    r
}

/// Binomial coefficient, extended to negative arguments per Kronenburg's
/// identities (<https://arxiv.org/pdf/1105.3689.pdf>).
#[must_use]
pub fn bin(nn: &Number, kk: &Number) -> Number {
    if nn.is_inf() || kk.is_inf() {
        return Number::inf();
    }
    let zero = Number::zero();
    let one = Number::one();
    let mut n = nn.clone();
    let mut k = kk.clone();
    let mut sign = one.clone();

    if n < zero {
        if !(k < zero) {
            sign = if k.odd() { Number::minus_one() } else { one.clone() };
            n = sub(&k, &add(&n, &one));
        } else if !(n < k) {
            sign = if sub(&n, &k).odd() { Number::minus_one() } else { one.clone() };
            let n_old = n.clone();
            n = sub(&zero, &add(&k, &one));
            k = sub(&n_old, &k);
        } else {
            return Number::zero();
        }
    }
    if k < zero || n < k {
        return Number::zero();
    }
    if n < mul(&k, &Number::two()) {
        k = sub(&n, &k);
    }

    let Ok(l) = k.to_i64() else {
        return Number::inf();
    };
    if l < 0 {
        return Number::zero();
    }

    let mut r = one;
    for i in 0..l {
        r = mul(&r, &sub(&n, &Number::from(i)));
        r = div(&r, &Number::from(i + 1));
        if r.is_inf() {
            break;
        }
    }
    mul(&sign, &r)
}

/// Integer logarithm: the smallest `r` with `b^r ≥ a`, i.e. `floor(log_b
/// a)` when `a` is an exact power, else one less. Rejects `a < 1` or
/// `b < 2` with `INF`.
#[must_use]
pub fn log(a: &Number, b: &Number) -> Number {
    let one = Number::one();
    let two = Number::two();
    if a.is_inf() || b.is_inf() || *a < one || *b < two {
        return Number::inf();
    }
    if *a == one {
        return Number::zero();
    }
    let mut m = one.clone();
    let mut res = Number::zero();
    while m < *a {
        m = mul(&m, b);
        res = add(&res, &one);
    }
    if m == *a {
        res
    } else {
        sub(&res, &one)
    }
}

/// Integer `b`-th root via binary search. Rejects `a < 0` or `b < 1`.
#[must_use]
pub fn nrt(a: &Number, b: &Number) -> Number {
    let zero = Number::zero();
    let one = Number::one();
    if a.is_inf() || b.is_inf() || *a < zero || *b < one {
        return Number::inf();
    }
    if *a == zero || *a == one || *b == one {
        return a.clone();
    }
    let mut r = one.clone();
    let mut lo = zero;
    let mut hi = a.clone();
    while lo < hi {
        let m = div(&add(&lo, &hi), &Number::two());
        let p = pow(&m, b);
        if p == *a {
            return m;
        }
        if p < *a {
            lo = m.clone();
        } else {
            hi = m.clone();
        }
        if r == m {
            break;
        }
        r = m;
    }
    r
}

/// Digit sum in base `b ≥ 2`, sign of the dividend preserved.
#[must_use]
pub fn dgs(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() || *b < Number::two() {
        return Number::inf();
    }
    let negative = a.is_negative();
    let mut aa = a.abs();
    let mut r = Number::zero();
    while aa != Number::zero() && !r.is_inf() && !aa.is_inf() {
        r = add(&r, &modulo(&aa, b));
        aa = div(&aa, b);
    }
    if negative {
        r.negate()
    } else {
        r
    }
}

/// Digital root in base `b ≥ 2`: repeated digit-sum fixed point, computed
/// directly via the standard closed form.
#[must_use]
pub fn dir(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() || *b < Number::two() {
        return Number::inf();
    }
    if *a == Number::zero() {
        return Number::zero();
    }
    let sign = if a.is_negative() { Number::minus_one() } else { Number::one() };
    let inner = modulo(&sub(&a.abs(), &Number::one()), &sub(b, &Number::one()));
    mul(&sign, &add(&Number::one(), &inner))
}

/// `1` if `a == b`, else `0`.
#[must_use]
pub fn equ(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() {
        return Number::inf();
    }
    Number::from(i64::from(a == b))
}

/// `1` if `a != b`, else `0`.
#[must_use]
pub fn neq(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() {
        return Number::inf();
    }
    Number::from(i64::from(a != b))
}

/// `1` if `a <= b`, else `0`.
#[must_use]
pub fn leq(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() {
        return Number::inf();
    }
    Number::from(i64::from(a <= b))
}

/// `1` if `a >= b`, else `0`.
#[must_use]
pub fn geq(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() {
        return Number::inf();
    }
    Number::from(i64::from(a >= b))
}

/// Lesser of `a`, `b`.
#[must_use]
pub fn min(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() {
        return Number::inf();
    }
    if a < b { a.clone() } else { b.clone() }
}

/// Greater of `a`, `b`.
#[must_use]
pub fn max(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() {
        return Number::inf();
    }
    if a < b { b.clone() } else { a.clone() }
}

/// Bitwise AND over the two's-complement representation.
#[must_use]
pub fn ban(a: &Number, b: &Number) -> Number {
    a.clone() & b.clone()
}

/// Bitwise OR over the two's-complement representation.
#[must_use]
pub fn bor(a: &Number, b: &Number) -> Number {
    a.clone() | b.clone()
}

/// Bitwise XOR over the two's-complement representation.
#[must_use]
pub fn bxo(a: &Number, b: &Number) -> Number {
    a.clone() ^ b.clone()
}

/// Multifactorial with step `b`: `a * (a-b) * (a-2b) * …` down to the last
/// positive term. `b < 1` maps to `INF`; `a < 0` maps to `INF`. Grounded
/// the same way as [`lex`]: the reference source this spec was distilled
/// from declares `FAC` in its operation-type table but its `Semantics`
/// class does not define a body for it in this snapshot. Multifactorial
/// is the standard reading of a step-parameterized "fac" mnemonic and is
/// this implementation's resolution — see DESIGN.md.
#[must_use]
pub fn fac(a: &Number, b: &Number) -> Number {
    if a.is_inf() || b.is_inf() || *b < Number::one() || a.is_negative() {
        return Number::inf();
    }
    let mut r = Number::one();
    let mut i = a.clone();
    while i > Number::zero() {
        r = mul(&r, &i);
        if r.is_inf() {
            return Number::inf();
        }
        i = sub(&i, b);
    }
    r
}

/// Whether `a` equals a small integer power of `base` strictly greater
/// than `base^0`. Used by the optimizer/minimizer to recognize "bad
/// constants" and by the GCD-to-loop minimizer rewrite.
#[must_use]
pub fn power_of(value: &Number, base: &Number) -> Option<u32> {
    if value.is_inf() || base.is_inf() {
        return None;
    }
    if *value < Number::one() || *base < Number::two() {
        return None;
    }
    let mut v = value.clone();
    let mut result = 0u32;
    while modulo(&v, base) == Number::zero() {
        result += 1;
        v = div(&v, base);
    }
    if v == Number::one() {
        Some(result)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: i64) -> Number {
        Number::from(v)
    }

    #[test]
    fn commutative_laws() {
        assert_eq!(add(&n(3), &n(5)), add(&n(5), &n(3)));
        assert_eq!(mul(&n(3), &n(5)), mul(&n(5), &n(3)));
        assert_eq!(gcd(&n(12), &n(18)), gcd(&n(18), &n(12)));
    }

    #[test]
    fn div_undoes_mul() {
        assert_eq!(div(&mul(&n(6), &n(7)), &n(7)), n(6));
    }

    #[test]
    fn div_by_zero_is_inf() {
        assert!(div(&n(1), &n(0)).is_inf());
        assert!(modulo(&n(1), &n(0)).is_inf());
    }

    #[test]
    fn dif_is_identity_unless_divisible() {
        assert_eq!(dif(&n(7), &n(2)), n(7));
        assert_eq!(dif(&n(8), &n(2)), n(4));
        assert_eq!(dif(&n(8), &n(0)), n(8));
    }

    #[test]
    fn pow_special_cases() {
        assert_eq!(pow(&n(0), &n(0)), n(1));
        assert_eq!(pow(&n(0), &n(1)), n(0));
        assert!(pow(&n(0), &n(-1)).is_inf());
        assert_eq!(pow(&n(1), &n(100)), n(1));
        assert_eq!(pow(&n(-1), &n(3)), n(-1));
        assert_eq!(pow(&n(-1), &n(4)), n(1));
        assert_eq!(pow(&n(2), &n(-3)), n(0));
        assert_eq!(pow(&n(2), &n(10)), n(1024));
    }

    #[test]
    fn pow_overflow_saturates_to_inf() {
        assert!(pow(&n(2), &n(10_000)).is_inf());
    }

    #[test]
    fn inf_is_absorbing_everywhere() {
        let inf = Number::inf();
        for f in [add, sub, mul, gcd, bin, min, max, equ] {
            assert!(f(&inf, &n(1)).is_inf());
            assert!(f(&n(1), &inf).is_inf());
        }
    }

    #[test]
    fn bin_matches_pascal_triangle() {
        assert_eq!(bin(&n(5), &n(2)), n(10));
        assert_eq!(bin(&n(10), &n(0)), n(1));
        assert_eq!(bin(&n(4), &n(5)), n(0));
    }

    #[test]
    fn log_and_nrt_round_trip_exact_powers() {
        assert_eq!(log(&n(8), &n(2)), n(3));
        assert_eq!(log(&n(9), &n(2)), n(3));
        assert_eq!(nrt(&n(27), &n(3)), n(3));
        assert_eq!(nrt(&n(26), &n(3)), n(2));
    }

    #[test]
    fn digit_sum_and_root_base_ten() {
        assert_eq!(dgs(&n(123), &n(10)), n(6));
        assert_eq!(dir(&n(123), &n(10)), n(6));
        assert_eq!(dir(&n(0), &n(10)), n(0));
    }

    #[test]
    fn power_of_detects_pure_powers() {
        assert_eq!(power_of(&n(8), &n(2)), Some(3));
        assert_eq!(power_of(&n(6), &n(2)), None);
    }
}
