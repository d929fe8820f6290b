//! Autograd operations with backward passes

use super::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Add two tensors element-wise
///
/// The result inherits the left operand's logical shape.
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "add operand size mismatch");

    let data = a.data() + b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad).with_shape(a.shape().to_vec());

    if requires_grad {
        let a_clone = a.clone();
        let b_clone = b.clone();
        let backward_op = Rc::new(AddBackward {
            a: a_clone,
            b: b_clone,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }

            // Recursively call backward on inputs
            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
            if let Some(op) = self.b.backward_op() {
                op.backward();
            }
        }
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad).with_shape(a.shape().to_vec());

    if requires_grad {
        let a_clone = a.clone();
        let backward_op = Rc::new(ScaleBackward {
            a: a_clone,
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * factor
                let grad_a = grad * self.factor;
                self.a.accumulate_grad(grad_a);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad).with_shape(a.shape().to_vec());

    if requires_grad {
        let a_clone = a.clone();
        let backward_op = Rc::new(ReluBackward {
            a: a_clone,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * (a > 0)
                let grad_a = grad * &self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
                self.a.accumulate_grad(grad_a);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// Matrix multiplication
///
/// Computes C = A @ B where:
/// - A is m×k (flattened to length m*k)
/// - B is k×n (flattened to length k*n)
/// - C is m×n (flattened to length m*n)
///
/// # Arguments
/// * `a` - Left matrix (m×k flattened)
/// * `b` - Right matrix (k×n flattened)
/// * `m` - Number of rows in A
/// * `k` - Number of columns in A (= rows in B)
/// * `n` - Number of columns in B
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "Matrix A size mismatch");
    assert_eq!(b.len(), k * n, "Matrix B size mismatch");

    // Compute C = A @ B
    let mut result_data = vec![0.0; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0;
            for p in 0..k {
                sum += a.data()[i * k + p] * b.data()[p * n + j];
            }
            result_data[i * n + j] = sum;
        }
    }

    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::new(Array1::from(result_data), requires_grad).with_shape(vec![m, n]);

    if requires_grad {
        let a_clone = a.clone();
        let b_clone = b.clone();
        let backward_op = Rc::new(MatmulBackward {
            a: a_clone,
            b: b_clone,
            m,
            k,
            n,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MatmulBackward {
    a: Tensor,
    b: Tensor,
    m: usize,
    k: usize,
    n: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        if let Some(grad_output) = self.result_grad.borrow().as_ref() {
            // ∂L/∂A = ∂L/∂C @ B^T
            // ∂L/∂B = A^T @ ∂L/∂C

            if self.a.requires_grad() {
                let mut grad_a = vec![0.0; self.m * self.k];
                // grad_A[i,p] = sum_j grad_C[i,j] * B[p,j]
                for i in 0..self.m {
                    for p in 0..self.k {
                        let mut sum = 0.0;
                        for j in 0..self.n {
                            sum += grad_output[i * self.n + j] * self.b.data()[p * self.n + j];
                        }
                        grad_a[i * self.k + p] = sum;
                    }
                }
                self.a.accumulate_grad(Array1::from(grad_a));
            }

            if self.b.requires_grad() {
                let mut grad_b = vec![0.0; self.k * self.n];
                // grad_B[p,j] = sum_i A[i,p] * grad_C[i,j]
                for p in 0..self.k {
                    for j in 0..self.n {
                        let mut sum = 0.0;
                        for i in 0..self.m {
                            sum += self.a.data()[i * self.k + p] * grad_output[i * self.n + j];
                        }
                        grad_b[p * self.n + j] = sum;
                    }
                }
                self.b.accumulate_grad(Array1::from(grad_b));
            }

            // Recursively call backward on inputs
            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
            if let Some(op) = self.b.backward_op() {
                op.backward();
            }
        }
    }
}

/// Add a per-row bias to a rows×cols matrix
///
/// Computes out[i,j] = x[i,j] + bias[i]. The result inherits x's logical
/// shape.
///
/// # Arguments
/// * `x` - Input matrix (rows×cols flattened)
/// * `bias` - Bias vector (length rows)
/// * `rows` - Number of rows in x
/// * `cols` - Number of columns in x
pub fn add_bias(x: &Tensor, bias: &Tensor, rows: usize, cols: usize) -> Tensor {
    assert_eq!(x.len(), rows * cols, "Matrix size mismatch");
    assert_eq!(bias.len(), rows, "Bias size mismatch");

    let mut result_data = vec![0.0; rows * cols];
    for i in 0..rows {
        let b = bias.data()[i];
        for j in 0..cols {
            result_data[i * cols + j] = x.data()[i * cols + j] + b;
        }
    }

    let requires_grad = x.requires_grad() || bias.requires_grad();
    let mut result =
        Tensor::new(Array1::from(result_data), requires_grad).with_shape(x.shape().to_vec());

    if requires_grad {
        let x_clone = x.clone();
        let bias_clone = bias.clone();
        let backward_op = Rc::new(AddBiasBackward {
            x: x_clone,
            bias: bias_clone,
            rows,
            cols,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBiasBackward {
    x: Tensor,
    bias: Tensor,
    rows: usize,
    cols: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for AddBiasBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.x.requires_grad() {
                // ∂L/∂x = ∂L/∂out (identity)
                self.x.accumulate_grad(grad.clone());
            }

            if self.bias.requires_grad() {
                // ∂L/∂bias[i] = sum_j ∂L/∂out[i,j] (the broadcast collapses)
                let mut grad_bias = vec![0.0; self.rows];
                for i in 0..self.rows {
                    let mut sum = 0.0;
                    for j in 0..self.cols {
                        sum += grad[i * self.cols + j];
                    }
                    grad_bias[i] = sum;
                }
                self.bias.accumulate_grad(Array1::from(grad_bias));
            }

            if let Some(op) = self.x.backward_op() {
                op.backward();
            }
            if let Some(op) = self.bias.backward_op() {
                op.backward();
            }
        }
    }
}

/// Pixel shuffle: rearrange r² channel planes into an r× upscaled grid
///
/// The input holds r² channels of samples×h×w pixels, laid out channel-major
/// as a (r²)×(samples·h·w) matrix. The output is the upscaled image stack of
/// shape [samples, h·r, w·r], where out[s, i·r+di, j·r+dj] comes from channel
/// di·r+dj at pixel (s, i, j). A pure permutation, so the backward pass is
/// the inverse permutation of the upstream gradient.
///
/// # Arguments
/// * `x` - Channel stack ((r²)×(samples·h·w) flattened)
/// * `samples` - Number of images in the stack
/// * `h` - Input height
/// * `w` - Input width
/// * `r` - Upscale factor
pub fn pixel_shuffle(x: &Tensor, samples: usize, h: usize, w: usize, r: usize) -> Tensor {
    let pixels = samples * h * w;
    assert_eq!(x.len(), r * r * pixels, "Channel stack size mismatch");

    let (hr, wr) = (h * r, w * r);
    let mut result_data = vec![0.0; x.len()];
    for s in 0..samples {
        for i in 0..h {
            for j in 0..w {
                let pixel = s * h * w + i * w + j;
                for di in 0..r {
                    for dj in 0..r {
                        let channel = di * r + dj;
                        let out_idx = s * hr * wr + (i * r + di) * wr + (j * r + dj);
                        result_data[out_idx] = x.data()[channel * pixels + pixel];
                    }
                }
            }
        }
    }

    let requires_grad = x.requires_grad();
    let mut result = Tensor::new(Array1::from(result_data), requires_grad)
        .with_shape(vec![samples, h * r, w * r]);

    if requires_grad {
        let x_clone = x.clone();
        let backward_op = Rc::new(PixelShuffleBackward {
            x: x_clone,
            samples,
            h,
            w,
            r,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct PixelShuffleBackward {
    x: Tensor,
    samples: usize,
    h: usize,
    w: usize,
    r: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for PixelShuffleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.x.requires_grad() {
                let (samples, h, w, r) = (self.samples, self.h, self.w, self.r);
                let pixels = samples * h * w;
                let (hr, wr) = (h * r, w * r);

                // Inverse permutation: scatter each output gradient back to
                // its channel-major slot.
                let mut grad_x = vec![0.0; grad.len()];
                for s in 0..samples {
                    for i in 0..h {
                        for j in 0..w {
                            let pixel = s * h * w + i * w + j;
                            for di in 0..r {
                                for dj in 0..r {
                                    let channel = di * r + dj;
                                    let out_idx =
                                        s * hr * wr + (i * r + di) * wr + (j * r + dj);
                                    grad_x[channel * pixels + pixel] = grad[out_idx];
                                }
                            }
                        }
                    }
                }
                self.x.accumulate_grad(Array1::from(grad_x));
            }

            if let Some(op) = self.x.backward_op() {
                op.backward();
            }
        }
    }
}

/// Nearest-neighbour upsample of an image stack by factor r
///
/// Each input pixel is replicated across an r×r output block. Input is
/// samples×h×w flattened; output has shape [samples, h·r, w·r]. Used as the
/// non-parametric skip path of residual upscaling networks.
pub fn upsample_nearest(x: &Tensor, samples: usize, h: usize, w: usize, r: usize) -> Tensor {
    assert_eq!(x.len(), samples * h * w, "Image stack size mismatch");

    let (hr, wr) = (h * r, w * r);
    let mut result_data = vec![0.0; samples * hr * wr];
    for s in 0..samples {
        for i in 0..hr {
            for j in 0..wr {
                let src = s * h * w + (i / r) * w + (j / r);
                result_data[s * hr * wr + i * wr + j] = x.data()[src];
            }
        }
    }

    let requires_grad = x.requires_grad();
    let mut result =
        Tensor::new(Array1::from(result_data), requires_grad).with_shape(vec![samples, hr, wr]);

    if requires_grad {
        let x_clone = x.clone();
        let backward_op = Rc::new(UpsampleNearestBackward {
            x: x_clone,
            samples,
            h,
            w,
            r,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct UpsampleNearestBackward {
    x: Tensor,
    samples: usize,
    h: usize,
    w: usize,
    r: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for UpsampleNearestBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.x.requires_grad() {
                let (samples, h, w, r) = (self.samples, self.h, self.w, self.r);
                let (hr, wr) = (h * r, w * r);

                // ∂L/∂x[s,p,q] = sum of the r×r output block fed by (p,q)
                let mut grad_x = vec![0.0; samples * h * w];
                for s in 0..samples {
                    for i in 0..hr {
                        for j in 0..wr {
                            grad_x[s * h * w + (i / r) * w + (j / r)] +=
                                grad[s * hr * wr + i * wr + j];
                        }
                    }
                }
                self.x.accumulate_grad(Array1::from(grad_x));
            }

            if let Some(op) = self.x.backward_op() {
                op.backward();
            }
        }
    }
}
