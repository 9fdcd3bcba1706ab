use rug::{Complex, Float};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Total ordering over `rug::Float` values: NaN compares equal to itself and
/// greater than every number, so sorting and map keys are well defined.
pub(crate) fn float_total_cmp(a: &Float, b: &Float) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

/// An arbitrary-precision real. The working precision is part of the value:
/// two reals are equal only if they agree in value and in precision.
#[derive(Clone, Debug)]
pub struct OrdFloat(Float);

impl OrdFloat {
    pub fn new(value: Float) -> Self {
        Self(value)
    }

    pub fn as_float(&self) -> &Float {
        &self.0
    }

    pub fn precision(&self) -> u32 {
        self.0.prec()
    }

    pub fn into_float(self) -> Float {
        self.0
    }
}

impl From<Float> for OrdFloat {
    fn from(value: Float) -> Self {
        Self(value)
    }
}

impl PartialEq for OrdFloat {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrdFloat {}

impl PartialOrd for OrdFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        float_total_cmp(&self.0, &other.0).then_with(|| self.0.prec().cmp(&other.0.prec()))
    }
}

impl Hash for OrdFloat {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        // Equal value and precision produce the same mantissa digits, so the
        // textual form is a sound hash input.
        self.0.prec().hash(hasher);
        self.0.to_string_radix(16, None).hash(hasher);
    }
}

/// A complex number with arbitrary-precision parts, ordered lexicographically
/// by real then imaginary part.
#[derive(Clone, Debug)]
pub struct OrdComplex(Complex);

impl OrdComplex {
    pub fn new(value: Complex) -> Self {
        Self(value)
    }

    pub fn as_complex(&self) -> &Complex {
        &self.0
    }

    pub fn real(&self) -> &Float {
        self.0.real()
    }

    pub fn imag(&self) -> &Float {
        self.0.imag()
    }
}

impl From<Complex> for OrdComplex {
    fn from(value: Complex) -> Self {
        Self(value)
    }
}

impl PartialEq for OrdComplex {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrdComplex {}

impl PartialOrd for OrdComplex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdComplex {
    fn cmp(&self, other: &Self) -> Ordering {
        float_total_cmp(self.real(), other.real())
            .then_with(|| float_total_cmp(self.imag(), other.imag()))
            .then_with(|| self.0.prec().cmp(&other.0.prec()))
    }
}

impl Hash for OrdComplex {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        let (real_prec, imag_prec) = self.0.prec();
        real_prec.hash(hasher);
        imag_prec.hash(hasher);
        self.real().to_string_radix(16, None).hash(hasher);
        self.imag().to_string_radix(16, None).hash(hasher);
    }
}
