use crate::error::CalculationError;
use std::fmt;

/// Operators available to calculation nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculationOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Abs,
    Negate,
    Sqrt,
    Floor,
    Ceil,
    Round,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Log,
    Log10,
    Exp,
    Min,
    Max,
    Average,
    Median,
    Variance,
    StdDev,
    Range,
    Hypot,
    GeometricMean,
    HarmonicMean,
}

/// How many operands an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
    /// One or more.
    Variadic,
}

impl Arity {
    fn describe(&self) -> &'static str {
        match self {
            Arity::Unary => "exactly 1",
            Arity::Binary => "exactly 2",
            Arity::Variadic => "at least 1",
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Unary => count == 1,
            Arity::Binary => count == 2,
            Arity::Variadic => count >= 1,
        }
    }
}

impl CalculationOperator {
    /// Parses an operator name; common symbols and spellings are accepted.
    pub fn parse(name: &str) -> Option<Self> {
        use CalculationOperator::*;
        let normalized = name.trim().to_lowercase().replace(['-', ' '], "_");
        let op = match normalized.as_str() {
            "add" | "sum" | "plus" | "+" => Add,
            "subtract" | "minus" | "sub" | "-" => Subtract,
            "multiply" | "times" | "product" | "mul" | "*" => Multiply,
            "divide" | "div" | "/" => Divide,
            "modulo" | "mod" | "%" => Modulo,
            "power" | "pow" | "^" | "**" => Power,
            "abs" | "absolute" => Abs,
            "negate" | "neg" => Negate,
            "sqrt" => Sqrt,
            "floor" => Floor,
            "ceil" | "ceiling" => Ceil,
            "round" => Round,
            "sin" => Sin,
            "cos" => Cos,
            "tan" => Tan,
            "asin" => Asin,
            "acos" => Acos,
            "atan" => Atan,
            "log" | "ln" => Log,
            "log10" => Log10,
            "exp" => Exp,
            "min" | "minimum" => Min,
            "max" | "maximum" => Max,
            "average" | "avg" | "mean" => Average,
            "median" => Median,
            "variance" | "var" => Variance,
            "std_dev" | "stddev" | "std" | "stdev" => StdDev,
            "range" => Range,
            "hypot" => Hypot,
            "geometric_mean" | "geomean" => GeometricMean,
            "harmonic_mean" => HarmonicMean,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(&self) -> &'static str {
        use CalculationOperator::*;
        match self {
            Add => "add",
            Subtract => "subtract",
            Multiply => "multiply",
            Divide => "divide",
            Modulo => "modulo",
            Power => "power",
            Abs => "abs",
            Negate => "negate",
            Sqrt => "sqrt",
            Floor => "floor",
            Ceil => "ceil",
            Round => "round",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Asin => "asin",
            Acos => "acos",
            Atan => "atan",
            Log => "log",
            Log10 => "log10",
            Exp => "exp",
            Min => "min",
            Max => "max",
            Average => "average",
            Median => "median",
            Variance => "variance",
            StdDev => "std_dev",
            Range => "range",
            Hypot => "hypot",
            GeometricMean => "geometric_mean",
            HarmonicMean => "harmonic_mean",
        }
    }

    pub fn arity(&self) -> Arity {
        use CalculationOperator::*;
        match self {
            Subtract | Divide | Modulo | Power => Arity::Binary,
            Abs | Negate | Sqrt | Floor | Ceil | Round | Sin | Cos | Tan | Asin | Acos | Atan
            | Log | Log10 | Exp => Arity::Unary,
            Add | Multiply | Min | Max | Average | Median | Variance | StdDev | Range | Hypot
            | GeometricMean | HarmonicMean => Arity::Variadic,
        }
    }

    pub fn check_arity(&self, count: usize) -> Result<(), CalculationError> {
        let arity = self.arity();
        if arity.accepts(count) {
            Ok(())
        } else {
            Err(CalculationError::Arity {
                operator: self.name(),
                expected: arity.describe(),
                found: count,
            })
        }
    }

    /// Applies the operator to already-resolved operands.
    pub fn apply(&self, operands: &[f64]) -> Result<f64, CalculationError> {
        use CalculationOperator::*;
        self.check_arity(operands.len())?;

        let domain = |value: f64| CalculationError::Domain {
            operator: self.name(),
            value,
        };
        let x = operands[0];

        let result = match self {
            Add => operands.iter().sum(),
            Multiply => operands.iter().product(),
            Subtract => x - operands[1],
            Divide => {
                if operands[1] == 0.0 {
                    return Err(CalculationError::DivisionByZero(self.name()));
                }
                x / operands[1]
            }
            Modulo => {
                let divisor = operands[1];
                if divisor == 0.0 {
                    return Err(CalculationError::DivisionByZero(self.name()));
                }
                // Floored modulo: the result takes the divisor's sign.
                x - divisor * (x / divisor).floor()
            }
            Power => x.powf(operands[1]),
            Abs => x.abs(),
            Negate => -x,
            Sqrt => {
                if x < 0.0 {
                    return Err(domain(x));
                }
                x.sqrt()
            }
            Floor => x.floor(),
            Ceil => x.ceil(),
            Round => x.round_ties_even(),
            Sin => x.sin(),
            Cos => x.cos(),
            Tan => x.tan(),
            Asin | Acos if !(-1.0..=1.0).contains(&x) => return Err(domain(x)),
            Asin => x.asin(),
            Acos => x.acos(),
            Atan => x.atan(),
            Log | Log10 if x <= 0.0 => return Err(domain(x)),
            Log => x.ln(),
            Log10 => x.log10(),
            Exp => x.exp(),
            Min => operands.iter().copied().fold(f64::INFINITY, f64::min),
            Max => operands.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Average => mean(operands),
            Median => median(operands),
            Variance => variance(operands),
            StdDev => variance(operands).sqrt(),
            Range => {
                let min = operands.iter().copied().fold(f64::INFINITY, f64::min);
                let max = operands.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                max - min
            }
            Hypot => operands.iter().map(|v| v * v).sum::<f64>().sqrt(),
            GeometricMean => {
                if let Some(bad) = operands.iter().copied().find(|v| *v <= 0.0) {
                    return Err(domain(bad));
                }
                (operands.iter().map(|v| v.ln()).sum::<f64>() / operands.len() as f64).exp()
            }
            HarmonicMean => {
                if let Some(bad) = operands.iter().copied().find(|v| *v < 0.0) {
                    return Err(domain(bad));
                }
                if operands.contains(&0.0) {
                    0.0
                } else {
                    operands.len() as f64 / operands.iter().map(|v| 1.0 / v).sum::<f64>()
                }
            }
        };
        Ok(result)
    }
}

impl fmt::Display for CalculationOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population variance.
fn variance(values: &[f64]) -> f64 {
    let mean = mean(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}
