// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Systematic (255, 223) Reed-Solomon code over GF(2^8), in the conventional (not dual) basis
//! with the CCSDS generator: field polynomial 0x187, first consecutive root 112 and primitive
//! element 11. Shortened codewords are handled by treating the missing leading symbols as zero.

use crate::error::{Error, Result};

const MM: usize = 8;
const NN: usize = (1 << MM) - 1;
/// Log of zero, in index form.
const A0: usize = NN;
const GFPOLY: usize = 0x187;
const FCR: usize = 112;
const PRIM: usize = 11;
/// Multiplicative inverse of `PRIM` modulo `NN`.
const IPRIM: usize = 116;

/// Number of parity symbols.
pub const NROOTS: usize = 32;
/// Largest number of data symbols in one codeword.
pub const MAX_DATA_LEN: usize = NN - NROOTS;

const fn modnn(mut x: usize) -> usize {
    while x >= NN {
        x -= NN;
        x = (x >> MM) + (x & NN);
    }
    x
}

const fn build_field() -> ([u8; NN + 1], [u8; NN + 1]) {
    let mut alpha_to = [0u8; NN + 1];
    let mut index_of = [0u8; NN + 1];
    index_of[0] = A0 as u8;
    alpha_to[A0] = 0;
    let mut sr = 1usize;
    let mut i = 0;
    while i < NN {
        index_of[sr] = i as u8;
        alpha_to[i] = sr as u8;
        sr <<= 1;
        if sr & (1 << MM) != 0 {
            sr ^= GFPOLY;
        }
        sr &= NN;
        i += 1;
    }
    (alpha_to, index_of)
}

const FIELD: ([u8; NN + 1], [u8; NN + 1]) = build_field();
const ALPHA_TO: [u8; NN + 1] = FIELD.0;
const INDEX_OF: [u8; NN + 1] = FIELD.1;

/// Generator polynomial coefficients, in index form.
const fn build_generator() -> [u8; NROOTS + 1] {
    let mut g = [0u8; NROOTS + 1];
    g[0] = 1;
    let mut i = 0;
    let mut root = FCR * PRIM;
    while i < NROOTS {
        g[i + 1] = 1;
        let mut j = i;
        while j > 0 {
            if g[j] != 0 {
                g[j] = g[j - 1] ^ ALPHA_TO[modnn(INDEX_OF[g[j] as usize] as usize + root)];
            } else {
                g[j] = g[j - 1];
            }
            j -= 1;
        }
        g[0] = ALPHA_TO[modnn(INDEX_OF[g[0] as usize] as usize + root)];
        i += 1;
        root += PRIM;
    }
    let mut k = 0;
    while k <= NROOTS {
        g[k] = INDEX_OF[g[k] as usize];
        k += 1;
    }
    g
}

const GENPOLY: [u8; NROOTS + 1] = build_generator();

#[inline]
fn alpha(x: usize) -> usize {
    ALPHA_TO[x] as usize
}

#[inline]
fn index(x: usize) -> usize {
    INDEX_OF[x] as usize
}

/// Computes the parity of up to [`MAX_DATA_LEN`] data bytes.
pub fn encode(data: &[u8]) -> [u8; NROOTS] {
    debug_assert!(data.len() <= MAX_DATA_LEN);
    let mut parity = [0u8; NROOTS];
    for &byte in data {
        let feedback = index((byte ^ parity[0]) as usize);
        if feedback != A0 {
            for j in 1..NROOTS {
                parity[j] ^= alpha(modnn(feedback + GENPOLY[NROOTS - j] as usize)) as u8;
            }
        }
        parity.copy_within(1.., 0);
        parity[NROOTS - 1] = if feedback != A0 {
            alpha(modnn(feedback + GENPOLY[0] as usize)) as u8
        } else {
            0
        };
    }
    parity
}

/// Corrects a codeword (data followed by [`NROOTS`] parity bytes) in place and returns the
/// number of corrected symbols. On failure the codeword is left untouched.
pub fn decode(codeword: &mut [u8]) -> Result<usize> {
    if codeword.len() <= NROOTS || codeword.len() > NN {
        return Err(Error::Uncorrectable);
    }
    let pad = NN - codeword.len();

    // Syndromes, evaluated at the generator roots.
    let mut s = [codeword[0] as usize; NROOTS];
    for &byte in &codeword[1..] {
        for (i, si) in s.iter_mut().enumerate() {
            *si = if *si == 0 {
                byte as usize
            } else {
                byte as usize ^ alpha(modnn(index(*si) + (FCR + i) * PRIM))
            };
        }
    }
    let mut syn_error = 0;
    for si in s.iter_mut() {
        syn_error |= *si;
        *si = index(*si);
    }
    if syn_error == 0 {
        return Ok(0);
    }

    // Berlekamp-Massey: error locator polynomial.
    let mut lambda = [0usize; NROOTS + 1];
    lambda[0] = 1;
    let mut b = [A0; NROOTS + 1];
    b[0] = 0;
    let mut t = [0usize; NROOTS + 1];
    let mut el = 0;
    for r in 1..=NROOTS {
        let mut discr_r = 0;
        for i in 0..r {
            if lambda[i] != 0 && s[r - i - 1] != A0 {
                discr_r ^= alpha(modnn(index(lambda[i]) + s[r - i - 1]));
            }
        }
        let discr_r = index(discr_r);
        if discr_r == A0 {
            b.copy_within(0..NROOTS, 1);
            b[0] = A0;
            continue;
        }
        t[0] = lambda[0];
        for i in 0..NROOTS {
            t[i + 1] = if b[i] != A0 {
                lambda[i + 1] ^ alpha(modnn(discr_r + b[i]))
            } else {
                lambda[i + 1]
            };
        }
        if 2 * el < r {
            el = r - el;
            for (bi, &li) in b.iter_mut().zip(lambda.iter()) {
                *bi = if li == 0 {
                    A0
                } else {
                    modnn(index(li) + NN - discr_r)
                };
            }
        } else {
            b.copy_within(0..NROOTS, 1);
            b[0] = A0;
        }
        lambda = t;
    }

    let mut deg_lambda = 0;
    for (i, l) in lambda.iter_mut().enumerate() {
        *l = index(*l);
        if *l != A0 {
            deg_lambda = i;
        }
    }
    if deg_lambda == 0 {
        return Err(Error::Uncorrectable);
    }

    // Chien search for the roots of the locator.
    let mut reg = lambda;
    let mut root = [0usize; NROOTS];
    let mut loc = [0usize; NROOTS];
    let mut count = 0;
    let mut k = IPRIM - 1;
    for i in 1..=NN {
        let mut q = 1;
        for j in (1..=deg_lambda).rev() {
            if reg[j] != A0 {
                reg[j] = modnn(reg[j] + j);
                q ^= alpha(reg[j]);
            }
        }
        if q == 0 {
            root[count] = i;
            loc[count] = k;
            count += 1;
            if count == deg_lambda {
                break;
            }
        }
        k = modnn(k + IPRIM);
    }
    if count != deg_lambda {
        return Err(Error::Uncorrectable);
    }

    // Error evaluator polynomial.
    let deg_omega = deg_lambda - 1;
    let mut omega = [A0; NROOTS + 1];
    for (i, o) in omega.iter_mut().enumerate().take(deg_omega + 1) {
        let mut tmp = 0;
        for j in 0..=i {
            if s[i - j] != A0 && lambda[j] != A0 {
                tmp ^= alpha(modnn(s[i - j] + lambda[j]));
            }
        }
        *o = index(tmp);
    }

    // Forney: error magnitudes. Nothing is written until every location checks out.
    let mut fixes = [(0usize, 0u8); NROOTS];
    let mut num_fixes = 0;
    for j in (0..count).rev() {
        let mut num1 = 0;
        for (i, &o) in omega.iter().enumerate().take(deg_omega + 1) {
            if o != A0 {
                num1 ^= alpha(modnn(o + i * root[j]));
            }
        }
        let num2 = alpha(modnn(root[j] * (FCR - 1) + NN));
        let mut den = 0;
        let mut i = deg_lambda.min(NROOTS - 1) & !1;
        loop {
            if lambda[i + 1] != A0 {
                den ^= alpha(modnn(lambda[i + 1] + i * root[j]));
            }
            if i < 2 {
                break;
            }
            i -= 2;
        }
        if den == 0 || loc[j] < pad {
            return Err(Error::Uncorrectable);
        }
        if num1 != 0 {
            let magnitude = alpha(modnn(index(num1) + index(num2) + NN - index(den)));
            fixes[num_fixes] = (loc[j] - pad, magnitude as u8);
            num_fixes += 1;
        }
    }
    for &(position, magnitude) in &fixes[..num_fixes] {
        codeword[position] ^= magnitude;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use test_log::test;

    use super::*;

    fn codeword(rng: &mut XorShiftRng, data_len: usize) -> Vec<u8> {
        let mut data: Vec<u8> = (0..data_len).map(|_| rng.random()).collect();
        let parity = encode(&data);
        data.extend_from_slice(&parity);
        data
    }

    #[test]
    fn field_tables_are_inverse() {
        for i in 0..NN {
            assert_eq!(index(alpha(i)), i);
        }
        assert_eq!(index(0), A0);
    }

    #[test]
    fn generator_is_monic() {
        // The leading coefficient is 1, i.e. alpha^0.
        assert_eq!(GENPOLY[NROOTS], 0);
    }

    #[test]
    fn clean_codeword_has_no_errors() {
        let mut rng = XorShiftRng::seed_from_u64(1);
        let mut cw = codeword(&mut rng, MAX_DATA_LEN);
        assert_eq!(decode(&mut cw).unwrap(), 0);
        let mut zeros = vec![0u8; NN];
        assert_eq!(decode(&mut zeros).unwrap(), 0);
    }

    #[test]
    fn corrects_up_to_sixteen_errors() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        for data_len in [MAX_DATA_LEN, 200, 60, 2] {
            for errors in [1, 5, 16] {
                let original = codeword(&mut rng, data_len);
                let mut damaged = original.clone();
                let mut positions = Vec::new();
                while positions.len() < errors {
                    let p = rng.random_range(0..damaged.len());
                    if !positions.contains(&p) {
                        positions.push(p);
                        damaged[p] ^= rng.random_range(1..=255u8);
                    }
                }
                assert_eq!(decode(&mut damaged).unwrap(), errors);
                assert_eq!(damaged, original);
            }
        }
    }

    #[test]
    fn single_symbol_errors_anywhere() {
        arbtest::arbtest(|u| {
            let data_len = u.int_in_range(1..=MAX_DATA_LEN)?;
            let mut data = Vec::with_capacity(data_len + NROOTS);
            for _ in 0..data_len {
                data.push(u.arbitrary()?);
            }
            let parity = encode(&data);
            data.extend_from_slice(&parity);
            let original = data.clone();
            let position = u.int_in_range(0..=data.len() - 1)?;
            let flip: u8 = u.int_in_range(1..=255)?;
            data[position] ^= flip;
            assert_eq!(decode(&mut data).unwrap(), 1);
            assert_eq!(data, original);
            Ok(())
        });
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(decode(&mut [0u8; NROOTS]).is_err());
        assert!(decode(&mut [0u8; NN + 1]).is_err());
    }
}
