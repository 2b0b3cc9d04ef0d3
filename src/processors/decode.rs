//! Greedy CTC decoding of recognition model output.
//!
//! The model emits a `[batch, timesteps, classes]` score tensor. Each timestep
//! is reduced to its arg-max class (first maximum wins). A class contributes a
//! character when it is not the blank, differs from the previous timestep's
//! class, and falls inside the alphabet.

use crate::core::constants::CTC_BLANK;
use crate::core::errors::{OCRError, OcrResult, SimpleError};
use crate::core::inference::TensorD;
use ndarray::{ArrayView1, Ix3};

/// Index of the first maximum and its value.
pub fn argmax(row: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in row.iter().enumerate() {
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// A decoded text line with the mean score of its emitted characters.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    pub text: String,
    /// 0.0 when nothing was emitted.
    pub score: f32,
}

/// CTC label decoder over `["blank", dict..., " "]`.
#[derive(Debug, Clone)]
pub struct CTCLabelDecode {
    alphabet: Vec<String>,
}

impl CTCLabelDecode {
    /// Builds the alphabet from the model's character dictionary.
    pub fn new(character_dict: &[String]) -> Self {
        let mut alphabet = Vec::with_capacity(character_dict.len() + 2);
        alphabet.push(CTC_BLANK.to_string());
        alphabet.extend(character_dict.iter().cloned());
        alphabet.push(" ".to_string());
        Self { alphabet }
    }

    /// Uses an alphabet verbatim, blank entry included.
    pub fn from_alphabet(alphabet: Vec<String>) -> Self {
        Self { alphabet }
    }

    pub fn alphabet(&self) -> &[String] {
        &self.alphabet
    }

    /// Collapses an arg-max index sequence into text.
    pub fn decode_indices(&self, indices: &[usize]) -> String {
        let mut text = String::new();
        let mut last: Option<usize> = None;
        for &idx in indices {
            if idx != 0 && Some(idx) != last && idx < self.alphabet.len() {
                text.push_str(&self.alphabet[idx]);
            }
            last = Some(idx);
        }
        text
    }

    /// Decodes every batch element of a `[batch, timesteps, classes]` tensor.
    ///
    /// # Errors
    ///
    /// Returns a post-processing error if the tensor is not rank 3.
    pub fn apply(&self, output: &TensorD) -> OcrResult<Vec<DecodedText>> {
        let scores = output.view().into_dimensionality::<Ix3>().map_err(|e| {
            OCRError::post_processing(
                &format!("expected [batch, timesteps, classes], got {:?}", output.shape()),
                e,
            )
        })?;
        if scores.shape()[2] == 0 {
            return Err(OCRError::post_processing(
                "recognition output has no classes",
                SimpleError::new("empty class axis"),
            ));
        }

        let mut decoded = Vec::with_capacity(scores.shape()[0]);
        for sequence in scores.outer_iter() {
            let mut text = String::new();
            let mut total = 0.0f32;
            let mut emitted = 0usize;
            let mut last: Option<usize> = None;
            for step in sequence.outer_iter() {
                let Some((idx, value)) = argmax(step) else {
                    continue;
                };
                if idx != 0 && Some(idx) != last && idx < self.alphabet.len() {
                    text.push_str(&self.alphabet[idx]);
                    total += value;
                    emitted += 1;
                }
                last = Some(idx);
            }
            let score = if emitted == 0 { 0.0 } else { total / emitted as f32 };
            decoded.push(DecodedText { text, score });
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, array};

    fn sparse_alphabet() -> CTCLabelDecode {
        let mut alphabet = vec![String::new(); 6];
        alphabet[0] = "blank".to_string();
        alphabet[3] = "A".to_string();
        alphabet[5] = "B".to_string();
        CTCLabelDecode::from_alphabet(alphabet)
    }

    #[test]
    fn collapses_repeats_and_blanks() {
        let decoder = sparse_alphabet();
        assert_eq!(decoder.decode_indices(&[0, 0, 3, 3, 0, 5, 5, 5, 0]), "AB");
    }

    #[test]
    fn repeated_character_needs_a_blank_between() {
        let decoder = CTCLabelDecode::new(&["a".to_string(), "b".to_string()]);
        assert_eq!(decoder.decode_indices(&[1, 1, 0, 1, 2]), "aab");
    }

    #[test]
    fn out_of_alphabet_index_is_skipped() {
        let decoder = CTCLabelDecode::new(&["a".to_string()]);
        // alphabet: blank, a, space
        assert_eq!(decoder.decode_indices(&[1, 7, 2]), "a ");
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(array![0.2, 0.4, 0.4].view()), Some((1, 0.4)));
        assert_eq!(argmax(ArrayView1::from(&[] as &[f32])), None);
    }

    #[test]
    fn apply_decodes_each_batch_element() {
        let decoder = CTCLabelDecode::new(&["x".to_string(), "y".to_string()]);
        let mut scores = Array3::<f32>::zeros((2, 3, 4));
        // element 0: x, blank, y
        scores[[0, 0, 1]] = 0.9;
        scores[[0, 1, 0]] = 0.8;
        scores[[0, 2, 2]] = 0.7;
        // element 1: all blank
        for t in 0..3 {
            scores[[1, t, 0]] = 1.0;
        }
        let out = decoder.apply(&scores.into_dyn()).unwrap();
        assert_eq!(out[0].text, "xy");
        assert!((out[0].score - 0.8).abs() < 1e-6);
        assert_eq!(out[1].text, "");
        assert_eq!(out[1].score, 0.0);
    }

    #[test]
    fn wrong_rank_is_an_error() {
        let decoder = CTCLabelDecode::new(&[]);
        assert!(decoder.apply(&ndarray::ArrayD::zeros(vec![2, 3])).is_err());
    }
}
