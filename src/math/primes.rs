//! Deterministic generation of NTT-friendly prime chains.

use super::modular::ModQ;

/// Witnesses that make Miller-Rabin deterministic for every 64-bit input.
const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Deterministic Miller-Rabin primality test.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = ModQ::pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = ModQ::mul(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Collect `count` distinct primes below `2^bits` that are ≡ 1 (mod `step`),
/// largest first.
///
/// Candidates are walked downward along `k·step + 1`, so the result depends
/// only on the arguments.
pub fn prime_chain(bits: u32, step: u64, count: usize) -> Vec<u64> {
    let mut primes = Vec::with_capacity(count);
    let mut k = ((1u64 << bits) - 2) / step;

    while primes.len() < count && k > 0 {
        let candidate = k * step + 1;
        if is_prime(candidate) {
            primes.push(candidate);
        }
        k -= 1;
    }

    primes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_primes() {
        let primes: Vec<u64> = (0..40).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37]);
        assert!(is_prime(257));
        assert!(is_prime(65537));
        assert!(!is_prime(561));
    }

    #[test]
    fn test_known_60_bit_prime() {
        assert!(is_prime(1152921504606830593));
        assert!(is_prime((1 << 61) - 1));
        assert!(!is_prime((1 << 32) + 1));
        assert!(!is_prime((1 << 60) - 1));
    }

    #[test]
    fn test_chain_congruence() {
        let step = 2 * 64 * 257;
        let chain = prime_chain(60, step, 6);

        assert_eq!(chain.len(), 6);
        for window in chain.windows(2) {
            assert!(window[0] > window[1]);
        }
        for &q in &chain {
            assert!(q < 1 << 60);
            assert_eq!(q % step, 1);
            assert!(is_prime(q));
        }
    }
}
