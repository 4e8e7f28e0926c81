//! Complex arithmetic over stacked real arrays.
//!
//! A [`ComplexPair`] stores a complex tensor as a real `ndarray` whose leading
//! axis has length 2: index 0 holds the real part, index 1 the imaginary part.
//! Every operation in this module works on that layout and broadcasts the
//! remaining axes with ndarray's trailing-axis rule, so a `[2, N]` layer
//! coefficient multiplies a `[2, batch, N]` signal directly.

use ndarray::{
    Array, ArrayBase, ArrayD, ArrayViewD, Axis, Data, Dimension, IxDyn, RemoveAxis, Zip,
};
use num_complex::Complex64;

use crate::error::{MeshError, MeshResult};

/// Complex tensor stored as `[real, imag]` along a leading axis of size 2.
#[derive(Clone, Debug, PartialEq)]
pub struct ComplexPair {
    data: ArrayD<f64>,
}

impl ComplexPair {
    /// Wrap an already stacked `[2, ...]` array.
    pub fn from_stacked(data: ArrayD<f64>) -> MeshResult<Self> {
        if data.ndim() == 0 || data.shape()[0] != 2 {
            return Err(MeshError::shape("from_stacked", data.shape(), &[2]));
        }
        Ok(Self { data })
    }

    /// Stack separate real and imaginary arrays of identical shape.
    pub fn from_parts<S, D>(re: ArrayBase<S, D>, im: ArrayBase<S, D>) -> MeshResult<Self>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        if re.shape() != im.shape() {
            return Err(MeshError::shape("from_parts", re.shape(), im.shape()));
        }
        Ok(Self {
            data: stacked(re.view().into_dyn(), im.view().into_dyn()),
        })
    }

    /// All-zero complex tensor with the given (unstacked) shape.
    pub fn zeros(shape: &[usize]) -> Self {
        let mut full = vec![2];
        full.extend_from_slice(shape);
        Self {
            data: ArrayD::zeros(IxDyn(&full)),
        }
    }

    /// Unit-modulus tensor `[cos(x), sin(x)]` for a real phase array `x`.
    pub fn from_phase<S, D>(phase: &ArrayBase<S, D>) -> Self
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let phase = phase.view().into_dyn();
        let re = phase.mapv(f64::cos);
        let im = phase.mapv(f64::sin);
        Self {
            data: stacked(re.view(), im.view()),
        }
    }

    /// Shape of the complex tensor, i.e. without the leading pair axis.
    pub fn shape(&self) -> &[usize] {
        &self.data.shape()[1..]
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim() - 1
    }

    /// Real part.
    pub fn re(&self) -> ArrayViewD<'_, f64> {
        self.data.index_axis(Axis(0), 0)
    }

    /// Imaginary part.
    pub fn im(&self) -> ArrayViewD<'_, f64> {
        self.data.index_axis(Axis(0), 1)
    }

    pub fn as_stacked(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_stacked(self) -> ArrayD<f64> {
        self.data
    }

    /// Multiply both parts by a real scalar.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            data: &self.data * factor,
        }
    }

    /// Squared modulus per element.
    pub fn norm_sqr(&self) -> ArrayD<f64> {
        let re = self.re();
        let im = self.im();
        &re * &re + &im * &im
    }

    /// Circular shift along a complex axis: `out[i] = self[i - shift]`.
    pub fn roll(&self, shift: isize, axis: usize) -> Self {
        Self {
            data: roll(&self.data, shift, axis + 1),
        }
    }

    /// Gather entries of the last complex axis by index.
    pub fn select_last(&self, indices: &[usize]) -> Self {
        let axis = self.data.ndim() - 1;
        Self {
            data: self.data.select(Axis(axis), indices),
        }
    }

    /// Sub-tensor at `index` along a complex axis, with that axis removed.
    pub fn index_axis(&self, axis: usize, index: usize) -> Self {
        Self {
            data: self.data.index_axis(Axis(axis + 1), index).to_owned(),
        }
    }

    /// Overwrite the sub-tensor at `index` along a complex axis with `value`.
    pub fn fill_index(&mut self, axis: usize, index: usize, value: Complex64) {
        self.data
            .index_axis_mut(Axis(0), 0)
            .index_axis_move(Axis(axis), index)
            .fill(value.re);
        self.data
            .index_axis_mut(Axis(0), 1)
            .index_axis_move(Axis(axis), index)
            .fill(value.im);
    }
}

fn stacked(re: ArrayViewD<'_, f64>, im: ArrayViewD<'_, f64>) -> ArrayD<f64> {
    let mut full = vec![2];
    full.extend_from_slice(re.shape());
    let mut data = ArrayD::zeros(IxDyn(&full));
    data.index_axis_mut(Axis(0), 0).assign(&re);
    data.index_axis_mut(Axis(0), 1).assign(&im);
    data
}

/// Circular shift of an array along `axis`: `out[i] = arr[i - shift]`.
pub fn roll<A, S, D>(arr: &ArrayBase<S, D>, shift: isize, axis: usize) -> Array<A, D>
where
    A: Clone,
    S: Data<Elem = A>,
    D: RemoveAxis,
{
    let n = arr.len_of(Axis(axis));
    if n == 0 {
        return arr.to_owned();
    }
    let indices: Vec<usize> = (0..n as isize)
        .map(|i| (i - shift).rem_euclid(n as isize) as usize)
        .collect();
    arr.select(Axis(axis), &indices)
}

/// Result shape of broadcasting `a` against `b` (trailing axes aligned).
pub(crate) fn broadcast_shape(
    op: &'static str,
    a: &[usize],
    b: &[usize],
) -> MeshResult<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let pad_a = ndim - a.len();
    let pad_b = ndim - b.len();
    (0..ndim)
        .map(|i| {
            let da = if i < pad_a { 1 } else { a[i - pad_a] };
            let db = if i < pad_b { 1 } else { b[i - pad_b] };
            match (da, db) {
                (x, y) if x == y => Ok(x),
                (1, y) => Ok(y),
                (x, 1) => Ok(x),
                _ => Err(MeshError::shape(op, a, b)),
            }
        })
        .collect()
}

fn zip_pairs<F>(
    op: &'static str,
    a: &ComplexPair,
    b: &ComplexPair,
    f: F,
) -> MeshResult<ComplexPair>
where
    F: FnOnce(
        ArrayViewD<'_, f64>,
        ArrayViewD<'_, f64>,
        ArrayViewD<'_, f64>,
        ArrayViewD<'_, f64>,
    ) -> (ArrayD<f64>, ArrayD<f64>),
{
    let shape = IxDyn(&broadcast_shape(op, a.shape(), b.shape())?);
    let err = || MeshError::shape(op, a.shape(), b.shape());
    let (ar, ai, br, bi) = (a.re(), a.im(), b.re(), b.im());
    let ar = ar.broadcast(shape.clone()).ok_or_else(err)?;
    let ai = ai.broadcast(shape.clone()).ok_or_else(err)?;
    let br = br.broadcast(shape.clone()).ok_or_else(err)?;
    let bi = bi.broadcast(shape).ok_or_else(err)?;
    let (re, im) = f(ar, ai, br, bi);
    ComplexPair::from_parts(re, im)
}

/// Element-wise complex sum.
pub fn add(a: &ComplexPair, b: &ComplexPair) -> MeshResult<ComplexPair> {
    zip_pairs("add", a, b, |ar, ai, br, bi| (&ar + &br, &ai + &bi))
}

/// Element-wise complex difference.
pub fn sub(a: &ComplexPair, b: &ComplexPair) -> MeshResult<ComplexPair> {
    zip_pairs("sub", a, b, |ar, ai, br, bi| (&ar - &br, &ai - &bi))
}

/// Element-wise complex product.
pub fn mul(a: &ComplexPair, b: &ComplexPair) -> MeshResult<ComplexPair> {
    zip_pairs("mul", a, b, |ar, ai, br, bi| {
        (&ar * &br - &ai * &bi, &ar * &bi + &ai * &br)
    })
}

/// Real tensor times complex tensor, the real operand multiplying both parts.
pub fn real_mul<S, D>(real: &ArrayBase<S, D>, comp: &ComplexPair) -> MeshResult<ComplexPair>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let real = real.view().into_dyn();
    let shape = IxDyn(&broadcast_shape("real_mul", real.shape(), comp.shape())?);
    let err = || MeshError::shape("real_mul", real.shape(), comp.shape());
    let (cr, ci) = (comp.re(), comp.im());
    let r = real.broadcast(shape.clone()).ok_or_else(err)?;
    let cr = cr.broadcast(shape.clone()).ok_or_else(err)?;
    let ci = ci.broadcast(shape).ok_or_else(err)?;
    ComplexPair::from_parts(&r * &cr, &r * &ci)
}

/// Complex scalar times complex tensor.
pub fn scalar_mul(s: Complex64, comp: &ComplexPair) -> ComplexPair {
    let (cr, ci) = (comp.re(), comp.im());
    let re = &cr * s.re - &ci * s.im;
    let im = &ci * s.re + &cr * s.im;
    ComplexPair {
        data: stacked(re.view(), im.view()),
    }
}

/// Complex conjugate: negates the imaginary part only.
pub fn conj(comp: &ComplexPair) -> ComplexPair {
    let mut data = comp.data.clone();
    data.index_axis_mut(Axis(0), 1).mapv_inplace(|v| -v);
    ComplexPair { data }
}

/// Split a native complex array into stacked `[real, imag]` form.
pub fn to_pair<S, D>(arr: &ArrayBase<S, D>) -> ComplexPair
where
    S: Data<Elem = Complex64>,
    D: Dimension,
{
    let re = arr.mapv(|c| c.re).into_dyn();
    let im = arr.mapv(|c| c.im).into_dyn();
    ComplexPair {
        data: stacked(re.view(), im.view()),
    }
}

/// Recombine a stacked pair into a native complex array.
pub fn from_pair(comp: &ComplexPair) -> ArrayD<Complex64> {
    Zip::from(&comp.re())
        .and(&comp.im())
        .map_collect(|&re, &im| Complex64::new(re, im))
}

/// A signal the mesh can consume and return: either an explicit pair or a
/// native complex array of any dimensionality.
pub trait Signal: Sized {
    fn to_pair(&self) -> ComplexPair;
    fn from_pair(pair: ComplexPair) -> MeshResult<Self>;
}

impl Signal for ComplexPair {
    fn to_pair(&self) -> ComplexPair {
        self.clone()
    }

    fn from_pair(pair: ComplexPair) -> MeshResult<Self> {
        Ok(pair)
    }
}

impl<D: Dimension> Signal for Array<Complex64, D> {
    fn to_pair(&self) -> ComplexPair {
        to_pair(self)
    }

    fn from_pair(pair: ComplexPair) -> MeshResult<Self> {
        let shape = pair.shape().to_vec();
        from_pair(&pair)
            .into_dimensionality::<D>()
            .map_err(|_| MeshError::shape("from_pair", &shape, &[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_pair(shape: &[usize], seed: u64) -> ComplexPair {
        let mut rng = StdRng::seed_from_u64(seed);
        let re = ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.gen_range(-1.0..1.0));
        let im = ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.gen_range(-1.0..1.0));
        ComplexPair::from_parts(re, im).unwrap()
    }

    #[test]
    fn test_mul_matches_num_complex() {
        let a = to_pair(&array![Complex64::new(1.0, 2.0), Complex64::new(-0.5, 0.25)]);
        let b = to_pair(&array![Complex64::new(3.0, -1.0), Complex64::new(2.0, 2.0)]);
        let out = from_pair(&mul(&a, &b).unwrap());

        assert_eq!(out[[0]], Complex64::new(1.0, 2.0) * Complex64::new(3.0, -1.0));
        assert_eq!(out[[1]], Complex64::new(-0.5, 0.25) * Complex64::new(2.0, 2.0));
    }

    #[test]
    fn test_conj_is_involution() {
        let c = random_pair(&[3, 5], 7);
        assert_eq!(conj(&conj(&c)), c);
    }

    #[test]
    fn test_mul_by_conj_is_real() {
        let a = random_pair(&[4, 6], 11);
        let prod = mul(&a, &conj(&a)).unwrap();

        for v in prod.im().iter() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-15);
        }
        for (p, n) in prod.re().iter().zip(a.norm_sqr().iter()) {
            assert_abs_diff_eq!(*p, *n, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_scalar_mul_by_i_rotates() {
        let c = to_pair(&array![Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)]);
        let out = from_pair(&scalar_mul(Complex64::i(), &c));

        assert_eq!(out[[0]], Complex64::new(0.0, 1.0));
        assert_eq!(out[[1]], Complex64::new(-1.0, 0.0));
    }

    #[test]
    fn test_real_mul_broadcasts_over_batch() {
        let c = random_pair(&[3, 4], 5);
        let r: Array1<f64> = array![1.0, 2.0, 0.0, -1.0];
        let out = real_mul(&r, &c).unwrap();

        assert_eq!(out.shape(), &[3, 4]);
        for b in 0..3 {
            for k in 0..4 {
                assert_eq!(out.re()[[b, k]], r[k] * c.re()[[b, k]]);
                assert_eq!(out.im()[[b, k]], r[k] * c.im()[[b, k]]);
            }
        }
    }

    #[test]
    fn test_add_sub_broadcast_layer_coefficients() {
        let batch = random_pair(&[5, 4], 3);
        let coeff = random_pair(&[4], 4);

        let sum = add(&batch, &coeff).unwrap();
        let back = sub(&sum, &coeff).unwrap();

        assert_eq!(sum.shape(), &[5, 4]);
        for (x, y) in back.as_stacked().iter().zip(batch.as_stacked().iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let a = ComplexPair::zeros(&[3, 4]);
        let b = ComplexPair::zeros(&[5]);

        assert!(matches!(mul(&a, &b), Err(MeshError::Shape { op: "mul", .. })));
        assert!(matches!(
            real_mul(&Array2::<f64>::zeros((2, 4)), &a),
            Err(MeshError::Shape { .. })
        ));
        assert!(ComplexPair::from_stacked(ArrayD::zeros(IxDyn(&[3, 4]))).is_err());
    }

    #[test]
    fn test_native_round_trip_is_lossless() {
        let c = random_pair(&[2, 3, 4], 19);
        let native = from_pair(&c);
        assert_eq!(to_pair(&native), c);

        let arr: Array2<Complex64> = Array2::from_shape_fn((2, 3), |(i, j)| {
            Complex64::new(i as f64 - 0.5, j as f64 * 1.5)
        });
        let back = <Array2<Complex64> as Signal>::from_pair(arr.to_pair()).unwrap();
        assert_eq!(back, arr);
    }

    #[test]
    fn test_roll_wraps_last_to_first() {
        let arr = array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]];

        assert_eq!(roll(&arr, 1, 0), array![[4.0, 5.0], [0.0, 1.0], [2.0, 3.0]]);
        assert_eq!(roll(&arr, -1, 0), array![[2.0, 3.0], [4.0, 5.0], [0.0, 1.0]]);
        assert_eq!(roll(&roll(&arr, 1, 1), -1, 1), arr);
    }

    #[test]
    fn test_fill_index_overwrites_one_row() {
        let mut c = random_pair(&[3, 2], 23);
        c.fill_index(0, 2, Complex64::new(1.0, 0.0));
        let native = from_pair(&c);

        assert_eq!(native[[2, 0]], Complex64::new(1.0, 0.0));
        assert_eq!(native[[2, 1]], Complex64::new(1.0, 0.0));
    }
}
