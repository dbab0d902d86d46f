//! The capability set: every global a sketch can reach
//!
//! Sketch code runs in a scope that holds these bindings and nothing else.
//! Native functions are [`Builtin`]s; native objects are [`Handle`]s whose
//! methods are dispatched by [`call_method`].

use core::f64::consts::PI;
use core::str::FromStr;

use embassy_time::Duration;

use crate::color::{Color, color_wheel, hsv_to_rgb, unpack};
use crate::context::RunContext;
use crate::error::CallError;
use crate::gamma::{gamma32, try_gamma8};
use crate::math8::{clamp8, clamp8_f64};
use crate::script::{Handle, Scope, Value};
use crate::strip::{ColorOrder, StripError, StripId};

/// Native global functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    CreateStrip,
    CreateButton,
    Delay,
    DelayMicroseconds,
    Millis,
    Micros,
    Random,
    RandomSeed,
    Min,
    Max,
    Abs,
    Constrain,
    Map,
    Sqrt,
    Pow,
    Sin,
    Cos,
    Array,
}

impl Builtin {
    pub const ALL: [Self; 18] = [
        Self::CreateStrip,
        Self::CreateButton,
        Self::Delay,
        Self::DelayMicroseconds,
        Self::Millis,
        Self::Micros,
        Self::Random,
        Self::RandomSeed,
        Self::Min,
        Self::Max,
        Self::Abs,
        Self::Constrain,
        Self::Map,
        Self::Sqrt,
        Self::Pow,
        Self::Sin,
        Self::Cos,
        Self::Array,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateStrip => "createStrip",
            Self::CreateButton => "createButton",
            Self::Delay => "delay",
            Self::DelayMicroseconds => "delayMicroseconds",
            Self::Millis => "millis",
            Self::Micros => "micros",
            Self::Random => "random",
            Self::RandomSeed => "randomSeed",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Constrain => "constrain",
            Self::Map => "map",
            Self::Sqrt => "sqrt",
            Self::Pow => "pow",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Array => "array",
        }
    }

    /// Whether the call hands control back to the host
    pub const fn suspends(self) -> bool {
        matches!(self, Self::Delay | Self::DelayMicroseconds)
    }
}

/// Bind the capability set into `scope`
pub fn install(scope: &Scope) {
    for builtin in Builtin::ALL {
        scope.declare(builtin.name().into(), Value::Builtin(builtin));
    }
    scope.declare("HIGH".into(), Value::Int(1));
    scope.declare("LOW".into(), Value::Int(0));
    scope.declare("PI".into(), Value::Float(PI));
    for (name, base) in [("DEC", 10), ("HEX", 16), ("OCT", 8), ("BIN", 2)] {
        scope.declare(name.into(), Value::Int(base));
    }
    scope.declare("Serial".into(), Value::Object(Handle::Serial));
    scope.declare("NeoPixel".into(), Value::Object(Handle::NeoPixel));
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Undefined)
}

fn int_arg(args: &[Value], index: usize) -> Result<i64, CallError> {
    arg(args, index).as_i64()
}

/// Integer argument with a default for missing or `undefined` values
fn int_arg_or(args: &[Value], index: usize, default: i64) -> Result<i64, CallError> {
    match arg(args, index) {
        Value::Undefined => Ok(default),
        value => value.as_i64(),
    }
}

/// Color channel argument, clamped to a byte
fn channel_arg(args: &[Value], index: usize) -> Result<u8, CallError> {
    match arg(args, index) {
        Value::Undefined => Ok(0),
        value if value.is_float() => Ok(clamp8_f64(value.as_f64()?)),
        value => Ok(clamp8(value.as_i64()?)),
    }
}

/// Packed color argument; only the low 32 bits are kept
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn color_arg(args: &[Value], index: usize) -> Result<u32, CallError> {
    Ok(int_arg_or(args, index, 0)? as u32)
}

fn expect_arity(name: &str, args: &[Value], min: usize) -> Result<(), CallError> {
    if args.len() < min {
        return Err(CallError::type_error(format!(
            "{name}() expects at least {min} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn millis_duration(value: i64) -> Duration {
    Duration::from_millis(u64::try_from(value).unwrap_or(0))
}

fn micros_duration(value: i64) -> Duration {
    Duration::from_micros(u64::try_from(value).unwrap_or(0))
}

#[allow(clippy::cast_possible_wrap)]
fn count_value(value: u64) -> Value {
    Value::Int(value as i64)
}

/// Call a native global function
pub async fn call_builtin(
    ctx: &RunContext,
    builtin: Builtin,
    args: &[Value],
) -> Result<Value, CallError> {
    let name = builtin.name();
    match builtin {
        Builtin::CreateStrip => {
            expect_arity(name, args, 2)?;
            let color_order = match arg(args, 2) {
                Value::Undefined => ctx.default_color_order(),
                Value::Str(order) => ColorOrder::from_str(order)?,
                other => {
                    return Err(StripError::InvalidArgument(format!(
                        "color order must be a string, got {}",
                        other.type_name()
                    ))
                    .into());
                }
            };
            let id = ctx.create_strip(int_arg(args, 0)?, int_arg(args, 1)?, color_order)?;
            Ok(Value::Object(Handle::Strip(id)))
        }
        Builtin::CreateButton => {
            expect_arity(name, args, 1)?;
            let id = ctx.create_button(&arg(args, 0).to_string())?;
            Ok(Value::Object(Handle::Button(id)))
        }
        Builtin::Delay => {
            ctx.delay(millis_duration(int_arg(args, 0)?)).await?;
            Ok(Value::Undefined)
        }
        Builtin::DelayMicroseconds => {
            ctx.delay(micros_duration(int_arg(args, 0)?)).await?;
            Ok(Value::Undefined)
        }
        Builtin::Millis => Ok(count_value(ctx.millis())),
        Builtin::Micros => Ok(count_value(ctx.micros())),
        Builtin::Random => {
            expect_arity(name, args, 1)?;
            let (min, max) = if args.len() >= 2 {
                (int_arg(args, 0)?, int_arg(args, 1)?)
            } else {
                (0, int_arg(args, 0)?)
            };
            Ok(Value::Int(ctx.random(min, max)))
        }
        Builtin::RandomSeed => {
            #[allow(clippy::cast_sign_loss)]
            ctx.random_seed(int_arg(args, 0)? as u64);
            Ok(Value::Undefined)
        }
        Builtin::Min | Builtin::Max => {
            expect_arity(name, args, 2)?;
            let (a, b) = (arg(args, 0), arg(args, 1));
            let a_first = if a.is_float() || b.is_float() {
                a.as_f64()? <= b.as_f64()?
            } else {
                a.as_i64()? <= b.as_i64()?
            };
            let pick_a = a_first == (builtin == Builtin::Min);
            Ok(if pick_a { a.clone() } else { b.clone() })
        }
        Builtin::Abs => match arg(args, 0) {
            Value::Float(x) => Ok(Value::Float(x.abs())),
            value => Ok(Value::Int(value.as_i64()?.wrapping_abs())),
        },
        Builtin::Constrain => {
            expect_arity(name, args, 3)?;
            if args.iter().take(3).any(Value::is_float) {
                let (x, lo, hi) = (args[0].as_f64()?, args[1].as_f64()?, args[2].as_f64()?);
                Ok(Value::Float(if x < lo {
                    lo
                } else if x > hi {
                    hi
                } else {
                    x
                }))
            } else {
                let (x, lo, hi) = (args[0].as_i64()?, args[1].as_i64()?, args[2].as_i64()?);
                Ok(Value::Int(if x < lo {
                    lo
                } else if x > hi {
                    hi
                } else {
                    x
                }))
            }
        }
        Builtin::Map => map_range(args),
        Builtin::Sqrt => Ok(Value::Float(libm::sqrt(arg(args, 0).as_f64()?))),
        Builtin::Pow => Ok(Value::Float(libm::pow(
            arg(args, 0).as_f64()?,
            arg(args, 1).as_f64()?,
        ))),
        Builtin::Sin => Ok(Value::Float(libm::sin(arg(args, 0).as_f64()?))),
        Builtin::Cos => Ok(Value::Float(libm::cos(arg(args, 0).as_f64()?))),
        Builtin::Array => {
            let len = usize::try_from(int_arg(args, 0)?)
                .map_err(|_| CallError::type_error("array length must not be negative"))?;
            Ok(Value::array(vec![Value::Int(0); len]))
        }
    }
}

/// Arduino `map()`: integer arithmetic unless a float is involved
fn map_range(args: &[Value]) -> Result<Value, CallError> {
    expect_arity("map", args, 5)?;
    if args.iter().take(5).any(Value::is_float) {
        let [x, in_min, in_max, out_min, out_max] = [0, 1, 2, 3, 4].map(|i| args[i].as_f64());
        let (x, in_min, in_max, out_min, out_max) = (x?, in_min?, in_max?, out_min?, out_max?);
        return Ok(Value::Float(
            (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min,
        ));
    }
    let [x, in_min, in_max, out_min, out_max] = [0, 1, 2, 3, 4].map(|i| args[i].as_i64());
    let (x, in_min, in_max, out_min, out_max) = (x?, in_min?, in_max?, out_min?, out_max?);
    let span = in_max.wrapping_sub(in_min);
    if span == 0 {
        return Err(CallError::type_error("map() input range is empty"));
    }
    Ok(Value::Int(
        x.wrapping_sub(in_min)
            .wrapping_mul(out_max.wrapping_sub(out_min))
            .wrapping_div(span)
            .wrapping_add(out_min),
    ))
}

/// Call a method on a native object
pub fn call_method(
    ctx: &RunContext,
    handle: Handle,
    method: &str,
    args: &[Value],
) -> Result<Value, CallError> {
    match handle {
        Handle::Strip(id) => strip_method(ctx, id, method, args),
        Handle::Button(id) => match method {
            "onClick" => {
                let callback = arg(args, 0);
                if !matches!(callback, Value::Function(_) | Value::Builtin(_)) {
                    return Err(CallError::type_error(format!(
                        "onClick() expects a function, got {}",
                        callback.type_name()
                    )));
                }
                ctx.set_on_click(id, callback.clone())?;
                Ok(Value::Undefined)
            }
            _ => Err(unknown_method("Button", method)),
        },
        Handle::Serial => match method {
            "begin" => {
                ctx.token().check()?;
                Ok(Value::Undefined)
            }
            "print" => {
                ctx.serial_print(&serial_text(args)?)?;
                Ok(Value::Undefined)
            }
            "println" => {
                ctx.serial_println(&serial_text(args)?)?;
                Ok(Value::Undefined)
            }
            _ => Err(unknown_method("Serial", method)),
        },
        Handle::NeoPixel => {
            color_helper(method, args).unwrap_or_else(|| Err(unknown_method("NeoPixel", method)))
        }
    }
}

/// What `Serial.print(value, format)` emits
///
/// For integers the format is a base (`DEC`, `HEX`, `OCT`, `BIN` or any
/// base up to 36); non-decimal bases print the low 32 bits unsigned. For
/// floats it is the number of decimals.
fn serial_text(args: &[Value]) -> Result<String, CallError> {
    let Some(value) = args.first() else {
        return Ok(String::new());
    };
    let Some(format) = args.get(1) else {
        return Ok(value.to_string());
    };
    let format = format.as_i64()?;
    match value {
        Value::Float(x) => {
            let digits = usize::try_from(format).unwrap_or(0);
            Ok(format!("{x:.digits$}"))
        }
        Value::Int(_) | Value::Bool(_) => {
            let n = value.as_i64()?;
            if format < 2 || format == 10 {
                return Ok(n.to_string());
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (bits, base) = (n as u32, format.min(36) as u32);
            Ok(radix_text(bits, base))
        }
        _ => Ok(value.to_string()),
    }
}

fn radix_text(mut n: u32, base: u32) -> String {
    let mut digits = Vec::new();
    loop {
        let digit = char::from_digit(n % base, base).unwrap_or('?');
        digits.push(digit.to_ascii_uppercase());
        n /= base;
        if n == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}

fn unknown_method(object: &str, method: &str) -> CallError {
    CallError::type_error(format!("{object} has no method `{method}`"))
}

/// Color helpers shared by strips and the static `NeoPixel` object
fn color_helper(method: &str, args: &[Value]) -> Option<Result<Value, CallError>> {
    let result = match method {
        "Color" => packed_color(args),
        "ColorHSV" => hsv_color(args),
        "gamma8" => int_arg(args, 0)
            .and_then(|value| Ok(try_gamma8(value)?))
            .map(|value| Value::Int(i64::from(value))),
        "gamma32" => color_arg(args, 0).map(|color| Value::Int(i64::from(gamma32(color)))),
        "Wheel" => int_arg(args, 0).map(|pos| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let pos = (pos & 0xFF) as u8;
            Value::Int(i64::from(color_wheel(pos)))
        }),
        _ => return None,
    };
    Some(result)
}

fn packed_color(args: &[Value]) -> Result<Value, CallError> {
    let color = Color::new(
        channel_arg(args, 0)?,
        channel_arg(args, 1)?,
        channel_arg(args, 2)?,
        channel_arg(args, 3)?,
    );
    Ok(Value::Int(i64::from(color.packed())))
}

/// Hue wraps around the 16-bit circle, saturation and value clamp
fn hsv_color(args: &[Value]) -> Result<Value, CallError> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let hue = int_arg_or(args, 0, 0)?.rem_euclid(65_536) as u32;
    let sat = clamp8(int_arg_or(args, 1, 255)?);
    let val = clamp8(int_arg_or(args, 2, 255)?);
    Ok(Value::Int(i64::from(hsv_to_rgb(hue, sat, val))))
}

fn strip_method(
    ctx: &RunContext,
    id: StripId,
    method: &str,
    args: &[Value],
) -> Result<Value, CallError> {
    match method {
        "begin" => ctx.with_strip(id, |_| Ok(Value::Undefined)),
        "show" => {
            ctx.show(id)?;
            Ok(Value::Undefined)
        }
        "canShow" => ctx.with_strip(id, |_| Ok(Value::Bool(true))),
        "numPixels" => ctx.with_strip(id, |strip| Ok(count_value(strip.pixel_count() as u64))),
        "getPin" => ctx.with_strip(id, |strip| Ok(Value::Int(strip.pin()))),
        "clear" => ctx.with_strip(id, |strip| {
            strip.clear();
            Ok(Value::Undefined)
        }),
        "fill" => {
            let color = color_arg(args, 0)?;
            let first = int_arg_or(args, 1, 0)?;
            let count = int_arg_or(args, 2, 0)?;
            ctx.with_strip(id, |strip| strip.fill(color, first, count))?;
            Ok(Value::Undefined)
        }
        "setPixelColor" => {
            let index = int_arg(args, 0)?;
            let color = match args.len() {
                2 => unpack(color_arg(args, 1)?),
                3..=5 => Color::new(
                    channel_arg(args, 1)?,
                    channel_arg(args, 2)?,
                    channel_arg(args, 3)?,
                    channel_arg(args, 4)?,
                ),
                n => {
                    return Err(CallError::type_error(format!(
                        "setPixelColor() expects 2 to 5 arguments, got {n}"
                    )));
                }
            };
            ctx.with_strip(id, |strip| strip.set_pixel_color(index, color))?;
            Ok(Value::Undefined)
        }
        "getPixelColor" => {
            let index = int_arg(args, 0)?;
            let color = ctx.with_strip(id, |strip| strip.pixel_color(index))?;
            Ok(Value::Int(i64::from(color)))
        }
        "setBrightness" => {
            let brightness = channel_arg(args, 0)?;
            ctx.with_strip(id, |strip| {
                strip.set_brightness(brightness);
                Ok(Value::Undefined)
            })
        }
        "getBrightness" => {
            ctx.with_strip(id, |strip| Ok(Value::Int(i64::from(strip.brightness()))))
        }
        _ => match color_helper(method, args) {
            Some(result) => {
                ctx.token().check()?;
                result
            }
            None => Err(unknown_method("Adafruit_NeoPixel", method)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::pack;

    #[test]
    fn test_builtin_names_are_unique() {
        for (i, a) in Builtin::ALL.iter().enumerate() {
            for b in &Builtin::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn test_static_color_helpers() {
        let color = color_helper("Color", &[Value::Int(255), Value::Int(0), Value::Int(0)]);
        assert_eq!(color, Some(Ok(Value::Int(0x00FF_0000))));

        let clamped = color_helper("Color", &[Value::Int(300), Value::Int(-5), Value::Int(0)]);
        assert_eq!(clamped, Some(Ok(Value::Int(i64::from(pack(255, 0, 0, 0))))));

        assert!(matches!(
            color_helper("gamma8", &[Value::Int(256)]),
            Some(Err(CallError::Color(_)))
        ));
        assert_eq!(color_helper("unknown", &[]), None);
    }

    #[test]
    fn test_serial_formats() {
        assert_eq!(serial_text(&[Value::Int(255), Value::Int(16)]), Ok("FF".to_owned()));
        assert_eq!(serial_text(&[Value::Int(5), Value::Int(2)]), Ok("101".to_owned()));
        assert_eq!(serial_text(&[Value::Int(8), Value::Int(8)]), Ok("10".to_owned()));
        assert_eq!(serial_text(&[Value::Int(-1), Value::Int(16)]), Ok("FFFFFFFF".to_owned()));
        assert_eq!(serial_text(&[Value::Int(-42), Value::Int(10)]), Ok("-42".to_owned()));
        assert_eq!(serial_text(&[Value::Float(1.23456), Value::Int(3)]), Ok("1.235".to_owned()));
        assert_eq!(serial_text(&[Value::Float(2.5)]), Ok("2.50".to_owned()));
        assert_eq!(serial_text(&[]), Ok(String::new()));
    }

    #[test]
    fn test_map_range() {
        let args = [0, 1023, 0, 255].map(Value::Int);
        let mut full = vec![Value::Int(512)];
        full.extend(args);
        assert_eq!(map_range(&full), Ok(Value::Int(127)));
    }

    #[test]
    fn test_map_range_wraps_like_integer_arithmetic() {
        let wide = [2, 0, 1, -1, i64::MAX].map(Value::Int);
        assert_eq!(map_range(&wide), Ok(Value::Int(-1)));

        let min_by_minus_one = [i64::MIN, 0, -1, 0, 1].map(Value::Int);
        assert_eq!(map_range(&min_by_minus_one), Ok(Value::Int(i64::MIN)));

        let empty = [5, 3, 3, 0, 10].map(Value::Int);
        assert!(matches!(map_range(&empty), Err(CallError::Type(_))));
    }
}
