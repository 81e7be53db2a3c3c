//! Parameter shape signatures used to validate loaded weights.

use burn::nn::conv::Conv2d;
use burn::nn::Linear;
use burn::prelude::*;

/// Flat list of `(parameter path, dims)` pairs in module order.
pub type ParamShapes = Vec<(String, Vec<usize>)>;

/// Modules that can describe the shapes of all their parameters.
///
/// Burn's record loading replaces tensors without checking their shapes, so a
/// loaded model is compared against a freshly configured one before use.
pub trait ShapeSignature {
    /// Append the shapes of this module's parameters under `prefix`.
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes);

    /// All parameter shapes of this module.
    fn param_shapes(&self) -> ParamShapes {
        let mut out = Vec::new();
        self.collect_shapes("", &mut out);
        out
    }
}

/// Join a parameter path segment onto a prefix.
pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

impl<B: Backend> ShapeSignature for Conv2d<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        out.push((join(prefix, "weight"), self.weight.val().dims().to_vec()));
        if let Some(bias) = &self.bias {
            out.push((join(prefix, "bias"), bias.val().dims().to_vec()));
        }
    }
}

impl<B: Backend> ShapeSignature for Linear<B> {
    fn collect_shapes(&self, prefix: &str, out: &mut ParamShapes) {
        out.push((join(prefix, "weight"), self.weight.val().dims().to_vec()));
        if let Some(bias) = &self.bias {
            out.push((join(prefix, "bias"), bias.val().dims().to_vec()));
        }
    }
}

/// Find the first difference between two signatures.
pub(crate) fn first_mismatch(expected: &ParamShapes, got: &ParamShapes) -> Option<String> {
    for (i, (want, have)) in expected.iter().zip(got.iter()).enumerate() {
        if want != have {
            return Some(format!(
                "parameter #{i}: expected {} {:?}, got {} {:?}",
                want.0, want.1, have.0, have.1
            ));
        }
    }
    if expected.len() != got.len() {
        return Some(format!(
            "expected {} parameters, got {}",
            expected.len(),
            got.len()
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join("", "weight"), "weight");
        assert_eq!(join("stem.conv", "weight"), "stem.conv.weight");
    }

    #[test]
    fn test_first_mismatch() {
        let a: ParamShapes = vec![("w".into(), vec![8, 3, 7, 7]), ("b".into(), vec![8])];
        let b: ParamShapes = vec![("w".into(), vec![16, 3, 7, 7]), ("b".into(), vec![8])];
        assert!(first_mismatch(&a, &a).is_none());
        assert!(first_mismatch(&a, &b).unwrap().contains("parameter #0"));
        assert!(first_mismatch(&a, &a[..1].to_vec()).is_some());
    }
}
