/*!
Registry of the algorithms the lab knows about.

The catalog is fixed at build time and mirrors what the providers can
offer: three ML-KEM parameter sets (FIPS 203) and three ML-DSA parameter
sets (FIPS 204). Whether a catalogued algorithm is actually usable is a
question for the loaded provider, see [`crate::core::crypto::provider`].
*/

use std::fmt;

use crate::core::error::{Error, Result};

/// Family an algorithm belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    /// Key Encapsulation Mechanism
    Kem,
    /// Digital Signature Algorithm
    Dsa,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmKind::Kem => write!(f, "KEM"),
            AlgorithmKind::Dsa => write!(f, "DSA"),
        }
    }
}

/// Fixed buffer lengths of a KEM parameter set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KemLengths {
    pub public_key: usize,
    pub secret_key: usize,
    pub ciphertext: usize,
    pub shared_secret: usize,
}

/// Fixed buffer lengths of a DSA parameter set
///
/// Signatures are variable-length up to `max_signature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigLengths {
    pub public_key: usize,
    pub secret_key: usize,
    pub max_signature: usize,
}

/// Buffer lengths, by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lengths {
    Kem(KemLengths),
    Dsa(SigLengths),
}

/// One algorithm variant and its buffer-size contract
#[derive(Debug, PartialEq, Eq)]
pub struct AlgorithmSpec {
    /// Canonical name, as the provider spells it
    pub name: &'static str,
    /// Short CLI alias
    pub alias: &'static str,
    /// Fixed-width code used on the wire
    pub code: u16,
    /// Claimed NIST security category
    pub nist_level: u8,
    /// Buffer lengths
    pub lengths: Lengths,
}

impl AlgorithmSpec {
    /// The algorithm family
    pub fn kind(&self) -> AlgorithmKind {
        match self.lengths {
            Lengths::Kem(_) => AlgorithmKind::Kem,
            Lengths::Dsa(_) => AlgorithmKind::Dsa,
        }
    }

    /// KEM lengths, or `None` for a DSA
    pub fn kem(&self) -> Option<&KemLengths> {
        match &self.lengths {
            Lengths::Kem(lengths) => Some(lengths),
            Lengths::Dsa(_) => None,
        }
    }

    /// DSA lengths, or `None` for a KEM
    pub fn dsa(&self) -> Option<&SigLengths> {
        match &self.lengths {
            Lengths::Dsa(lengths) => Some(lengths),
            Lengths::Kem(_) => None,
        }
    }

    /// Public key length for either kind
    pub fn public_key_len(&self) -> usize {
        match &self.lengths {
            Lengths::Kem(l) => l.public_key,
            Lengths::Dsa(l) => l.public_key,
        }
    }

    /// Secret key length for either kind
    pub fn secret_key_len(&self) -> usize {
        match &self.lengths {
            Lengths::Kem(l) => l.secret_key,
            Lengths::Dsa(l) => l.secret_key,
        }
    }

    /// Whether `name` refers to this spec (canonical name or alias, any case)
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.alias.eq_ignore_ascii_case(name)
    }

    /// KEM lengths, failing with `UnsupportedAlgorithm` for a DSA spec
    pub(crate) fn require_kem(&self) -> Result<&KemLengths> {
        self.kem()
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("{} is not a KEM", self.name)))
    }

    /// DSA lengths, failing with `UnsupportedAlgorithm` for a KEM spec
    pub(crate) fn require_dsa(&self) -> Result<&SigLengths> {
        self.dsa()
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("{} is not a DSA", self.name)))
    }
}

impl fmt::Display for AlgorithmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub static ML_KEM_512: AlgorithmSpec = AlgorithmSpec {
    name: "ML-KEM-512",
    alias: "mlkem512",
    code: 0x0001,
    nist_level: 1,
    lengths: Lengths::Kem(KemLengths {
        public_key: 800,
        secret_key: 1632,
        ciphertext: 768,
        shared_secret: 32,
    }),
};

pub static ML_KEM_768: AlgorithmSpec = AlgorithmSpec {
    name: "ML-KEM-768",
    alias: "mlkem768",
    code: 0x0002,
    nist_level: 3,
    lengths: Lengths::Kem(KemLengths {
        public_key: 1184,
        secret_key: 2400,
        ciphertext: 1088,
        shared_secret: 32,
    }),
};

pub static ML_KEM_1024: AlgorithmSpec = AlgorithmSpec {
    name: "ML-KEM-1024",
    alias: "mlkem1024",
    code: 0x0003,
    nist_level: 5,
    lengths: Lengths::Kem(KemLengths {
        public_key: 1568,
        secret_key: 3168,
        ciphertext: 1568,
        shared_secret: 32,
    }),
};

pub static ML_DSA_44: AlgorithmSpec = AlgorithmSpec {
    name: "ML-DSA-44",
    alias: "mldsa44",
    code: 0x0101,
    nist_level: 2,
    lengths: Lengths::Dsa(SigLengths {
        public_key: 1312,
        secret_key: 2560,
        max_signature: 2420,
    }),
};

pub static ML_DSA_65: AlgorithmSpec = AlgorithmSpec {
    name: "ML-DSA-65",
    alias: "mldsa65",
    code: 0x0102,
    nist_level: 3,
    lengths: Lengths::Dsa(SigLengths {
        public_key: 1952,
        secret_key: 4032,
        max_signature: 3309,
    }),
};

pub static ML_DSA_87: AlgorithmSpec = AlgorithmSpec {
    name: "ML-DSA-87",
    alias: "mldsa87",
    code: 0x0103,
    nist_level: 5,
    lengths: Lengths::Dsa(SigLengths {
        public_key: 2592,
        secret_key: 4896,
        max_signature: 4627,
    }),
};

/// Catalog order; also the order `list` reports
static CATALOG: [&AlgorithmSpec; 6] = [
    &ML_KEM_512,
    &ML_KEM_768,
    &ML_KEM_1024,
    &ML_DSA_44,
    &ML_DSA_65,
    &ML_DSA_87,
];

/// Every catalogued algorithm, KEMs first
pub fn all() -> impl Iterator<Item = &'static AlgorithmSpec> {
    CATALOG.iter().copied()
}

/// Catalogued algorithms of one kind, in catalog order
pub fn list(kind: AlgorithmKind) -> Vec<&'static AlgorithmSpec> {
    all().filter(|spec| spec.kind() == kind).collect()
}

/// Look an algorithm up by canonical name or alias
pub fn lookup(name: &str) -> Result<&'static AlgorithmSpec> {
    all()
        .find(|spec| spec.matches(name))
        .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
}

/// Look an algorithm up by name, requiring a particular kind
pub fn lookup_kind(kind: AlgorithmKind, name: &str) -> Result<&'static AlgorithmSpec> {
    let spec = lookup(name)?;
    if spec.kind() != kind {
        return Err(Error::UnknownAlgorithm(format!("{} is not a {}", spec.name, kind)));
    }
    Ok(spec)
}

/// Look an algorithm up by its wire code
pub fn by_code(kind: AlgorithmKind, code: u16) -> Option<&'static AlgorithmSpec> {
    all().find(|spec| spec.kind() == kind && spec.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_alias() {
        assert_eq!(lookup("ML-KEM-768").unwrap(), &ML_KEM_768);
        assert_eq!(lookup("mlkem768").unwrap(), &ML_KEM_768);
        assert_eq!(lookup("ml-dsa-44").unwrap(), &ML_DSA_44);
        assert!(matches!(lookup("kyber768"), Err(Error::UnknownAlgorithm(_))));
    }

    #[test]
    fn test_lookup_kind_rejects_other_family() {
        assert!(lookup_kind(AlgorithmKind::Kem, "ML-DSA-65").is_err());
        assert_eq!(lookup_kind(AlgorithmKind::Dsa, "mldsa65").unwrap().name, "ML-DSA-65");
    }

    #[test]
    fn test_list_is_ordered() {
        let kems: Vec<_> = list(AlgorithmKind::Kem).iter().map(|s| s.name).collect();
        assert_eq!(kems, ["ML-KEM-512", "ML-KEM-768", "ML-KEM-1024"]);

        let dsas: Vec<_> = list(AlgorithmKind::Dsa).iter().map(|s| s.name).collect();
        assert_eq!(dsas, ["ML-DSA-44", "ML-DSA-65", "ML-DSA-87"]);
    }

    #[test]
    fn test_codes_are_unique() {
        let specs: Vec<_> = all().collect();
        for (i, a) in specs.iter().enumerate() {
            for b in &specs[i + 1..] {
                assert_ne!(a.code, b.code, "{} and {}", a.name, b.name);
            }
            assert_eq!(by_code(a.kind(), a.code), Some(*a));
        }
        assert_eq!(by_code(AlgorithmKind::Dsa, ML_KEM_512.code), None);
    }

    #[test]
    fn test_kind_accessors() {
        assert_eq!(ML_KEM_1024.kem().unwrap().ciphertext, 1568);
        assert!(ML_KEM_1024.dsa().is_none());
        assert_eq!(ML_DSA_87.dsa().unwrap().max_signature, 4627);
        assert!(ML_DSA_87.require_kem().is_err());
    }
}
