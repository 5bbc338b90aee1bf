// graftreads: Placement of sequencing reads onto a reference alignment tree.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//

//! Sequence alphabets and state lookups.
//!
//! States are indexes into the *full character* alphabet of the data type,
//! which includes the ambiguity symbols. Codon states index the 61 sense
//! codons in lexicographic order; anything else is
//! [UNKNOWN_CODON_STATE].

/// Nucleotides followed by the IUPAC ambiguity codes.
pub const DNA_FULL_ALPHABET: &[u8] = b"ACGTRYMKWSBDHVN";

/// Amino acids followed by the ambiguity codes.
pub const PROTEIN_FULL_ALPHABET: &[u8] = b"ARNDCQEGHILKMFPSTWYVBZX";

/// Character separating the two mates of a paired read.
pub const BREAK_MARKER: u8 = b'0';

/// State assigned to triplets that are not sense codons.
pub const UNKNOWN_CODON_STATE: usize = 61;

/// Symbol stored for triplets that are not sense codons.
pub const UNKNOWN_CODON_SYMBOL: &str = "NNN";

const NUCLEOTIDES: &[u8] = b"ACGT";
const STOP_CODONS: [&[u8]; 3] = [b"TAA", b"TAG", b"TGA"];

/// Sequence data types.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataType {
    #[default]
    Dna,
    Protein,
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dna" => Ok(DataType::Dna),
            "protein" => Ok(DataType::Protein),
            _ => Err(format!("'{}' is not a valid DataType", s)),
        }
    }
}

impl DataType {
    pub fn full_alphabet(&self) -> &'static [u8] {
        match self {
            DataType::Dna => DNA_FULL_ALPHABET,
            DataType::Protein => PROTEIN_FULL_ALPHABET,
        }
    }

    /// Symbol used for masked and unresolved positions.
    pub fn unknown_symbol(&self) -> u8 {
        match self {
            DataType::Dna => b'N',
            DataType::Protein => b'X',
        }
    }

    /// State of `symbol`, case-insensitive.
    pub fn state_of(&self, symbol: u8) -> Option<usize> {
        let upper = symbol.to_ascii_uppercase();
        self.full_alphabet().iter().position(|x| *x == upper)
    }

    /// State of [unknown_symbol](Self::unknown_symbol).
    pub fn unknown_state(&self) -> usize {
        self.full_alphabet().len() - 1
    }

    pub fn gap_symbol(&self, codons: bool) -> &'static str {
        if codons && *self == DataType::Dna { "---" } else { "-" }
    }
}

/// The 61 sense codons in lexicographic ACGT order.
pub fn codon_alphabet() -> Vec<[u8; 3]> {
    let mut codons: Vec<[u8; 3]> = Vec::with_capacity(61);
    for a in NUCLEOTIDES {
        for b in NUCLEOTIDES {
            for c in NUCLEOTIDES {
                let codon = [*a, *b, *c];
                if !STOP_CODONS.iter().any(|stop| *stop == codon) {
                    codons.push(codon);
                }
            }
        }
    }
    codons
}

/// State of a triplet, [UNKNOWN_CODON_STATE] if it is not a sense codon.
pub fn codon_state(codons: &[[u8; 3]], triplet: &[u8]) -> usize {
    if triplet.len() != 3 {
        return UNKNOWN_CODON_STATE;
    }
    let upper = [triplet[0].to_ascii_uppercase(), triplet[1].to_ascii_uppercase(), triplet[2].to_ascii_uppercase()];
    codons.iter().position(|x| *x == upper).unwrap_or(UNKNOWN_CODON_STATE)
}

/// Guess the data type of a set of sequences.
///
/// Sequences are nucleotide data when at least 90% of the characters,
/// excluding break markers and gaps, are one of `ACGTUN`.
pub fn detect_data_type<'a, I: IntoIterator<Item = &'a [u8]>>(sequences: I) -> DataType {
    let mut total = 0_usize;
    let mut nucleotide = 0_usize;
    sequences.into_iter().for_each(|seq| {
        seq.iter().filter(|x| **x != BREAK_MARKER && **x != b'-').for_each(|x| {
            total += 1;
            if b"ACGTUN".contains(&x.to_ascii_uppercase()) {
                nucleotide += 1;
            }
        });
    });

    if total == 0 || nucleotide as f64 / total as f64 >= 0.9 {
        DataType::Dna
    } else {
        DataType::Protein
    }
}

/// Remove characters that are not in the alphabet of `data_type`.
///
/// Quality scores at removed positions are dropped too. Break markers are
/// kept. Returns the number of characters removed.
pub fn strip_illegal(
    data_type: DataType,
    seq: &mut Vec<u8>,
    qual: Option<&mut Vec<u8>>,
) -> usize {
    let keep: Vec<bool> = seq.iter().map(|x| {
        *x == BREAK_MARKER || data_type.state_of(*x).is_some()
    }).collect();
    let removed = keep.iter().filter(|x| !**x).count();
    if removed == 0 {
        return 0;
    }

    let mut it = keep.iter();
    seq.retain(|_| *it.next().unwrap_or(&true));
    if let Some(qual) = qual {
        if qual.len() == keep.len() {
            let mut it = keep.iter();
            qual.retain(|_| *it.next().unwrap_or(&true));
        }
    }
    removed
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn codon_alphabet_has_61_sense_codons() {
        use super::codon_alphabet;

        let got = codon_alphabet();

        assert_eq!(got.len(), 61);
        assert_eq!(got[0], *b"AAA");
        assert_eq!(got[60], *b"TTT");
        assert!(!got.contains(b"TAA"));
        assert!(!got.contains(b"TGA"));
    }

    #[test]
    fn codon_state_unknown_triplet() {
        use super::codon_alphabet;
        use super::codon_state;
        use super::UNKNOWN_CODON_STATE;

        let codons = codon_alphabet();

        assert_eq!(codon_state(&codons, b"AAC"), 1);
        assert_eq!(codon_state(&codons, b"aac"), 1);
        assert_eq!(codon_state(&codons, b"TAG"), UNKNOWN_CODON_STATE);
        assert_eq!(codon_state(&codons, b"ANA"), UNKNOWN_CODON_STATE);
        assert_eq!(codon_state(&codons, b"AC"), UNKNOWN_CODON_STATE);
    }

    #[test]
    fn state_of_dna_symbols() {
        use super::DataType;

        assert_eq!(DataType::Dna.state_of(b'A'), Some(0));
        assert_eq!(DataType::Dna.state_of(b't'), Some(3));
        assert_eq!(DataType::Dna.state_of(b'N'), Some(DataType::Dna.unknown_state()));
        assert_eq!(DataType::Dna.state_of(b'E'), None);
        assert_eq!(DataType::Protein.state_of(b'X'), Some(DataType::Protein.unknown_state()));
    }

    #[test]
    fn detect_data_type_dna_and_protein() {
        use super::detect_data_type;
        use super::DataType;

        let dna: Vec<&[u8]> = vec![b"ACGTACGT0ACGT", b"acgtn"];
        let protein: Vec<&[u8]> = vec![b"MKLVEEQRW", b"PPGA"];

        assert_eq!(detect_data_type(dna), DataType::Dna);
        assert_eq!(detect_data_type(protein), DataType::Protein);
    }

    #[test]
    fn strip_illegal_keeps_quality_in_sync() {
        use super::strip_illegal;
        use super::DataType;

        let mut seq = b"AC*GT0A.C".to_vec();
        let mut qual = b"IIJIIIIKI".to_vec();

        let removed = strip_illegal(DataType::Dna, &mut seq, Some(&mut qual));

        assert_eq!(removed, 2);
        assert_eq!(seq, b"ACGT0AC".to_vec());
        assert_eq!(qual, b"IIIIIII".to_vec());
    }
}
