//! Modular arithmetic over Z_q for q < 2^63.

/// Static helpers for arithmetic in Z_q.
///
/// Inputs are expected to be reduced into `[0, q)` unless stated otherwise.
pub struct ModQ;

impl ModQ {
    #[inline]
    pub fn add(a: u64, b: u64, q: u64) -> u64 {
        let sum = a + b;
        if sum >= q {
            sum - q
        } else {
            sum
        }
    }

    #[inline]
    pub fn sub(a: u64, b: u64, q: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            q - (b - a)
        }
    }

    #[inline]
    pub fn mul(a: u64, b: u64, q: u64) -> u64 {
        ((a as u128 * b as u128) % q as u128) as u64
    }

    #[inline]
    pub fn negate(a: u64, q: u64) -> u64 {
        if a == 0 {
            0
        } else {
            q - a
        }
    }

    /// Square-and-multiply exponentiation.
    pub fn pow(mut base: u64, mut exp: u64, q: u64) -> u64 {
        let mut result = 1 % q;
        base %= q;
        while exp > 0 {
            if exp & 1 == 1 {
                result = Self::mul(result, base, q);
            }
            base = Self::mul(base, base, q);
            exp >>= 1;
        }
        result
    }

    /// Multiplicative inverse via the extended Euclidean algorithm.
    ///
    /// Returns `None` when `a` is not invertible modulo `q`.
    pub fn inverse(a: u64, q: u64) -> Option<u64> {
        let (mut t, mut new_t) = (0i128, 1i128);
        let (mut r, mut new_r) = (q as i128, (a % q) as i128);

        while new_r != 0 {
            let quotient = r / new_r;
            (t, new_t) = (new_t, t - quotient * new_t);
            (r, new_r) = (new_r, r - quotient * new_r);
        }

        if r != 1 {
            return None;
        }
        if t < 0 {
            t += q as i128;
        }
        Some(t as u64)
    }

    /// Lift a signed integer into Z_q.
    #[inline]
    pub fn from_signed(val: i64, q: u64) -> u64 {
        let r = (val as i128).rem_euclid(q as i128);
        r as u64
    }

    /// Centered representative in `(-q/2, q/2]`.
    #[inline]
    pub fn to_signed(val: u64, q: u64) -> i64 {
        if val <= q / 2 {
            val as i64
        } else {
            -((q - val) as i64)
        }
    }

    /// Find an element of exact order `order` (a power of two) in Z_q^*.
    pub fn root_of_unity(order: u64, q: u64) -> Option<u64> {
        if order == 0 || (q - 1) % order != 0 {
            return None;
        }
        let exp = (q - 1) / order;
        (2..q)
            .map(|g| Self::pow(g, exp, q))
            .find(|&c| Self::pow(c, order / 2, q) != 1)
    }
}
