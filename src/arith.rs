use crate::cell::*;
use crate::error::*;
use crate::state::*;

fn arithmetic_ops_int(xs: &mut State, ops_int: fn(Xint, Xint) -> Xint) -> Xresult {
    let b = xs.pop_data()?;
    let a = xs.pop_data()?;
    xs.push_data(ops_int(a, b))
}

fn division_ops_int(xs: &mut State, ops_int: fn(Xint, Xint) -> Xint) -> Xresult {
    let b = xs.pop_data()?;
    let a = xs.pop_data()?;
    if b == 0 {
        return Err(Xerr::DivisionByZero);
    }
    xs.push_data(ops_int(a, b))
}

fn unary_ops_int(xs: &mut State, ops_int: fn(Xint) -> Xint) -> Xresult {
    let a = xs.pop_data()?;
    xs.push_data(ops_int(a))
}

fn compare_ops(xs: &mut State, ops: fn(&Xint, &Xint) -> bool) -> Xresult {
    let b = xs.pop_data()?;
    let a = xs.pop_data()?;
    xs.push_data(flag(ops(&a, &b)))
}

fn test_ops(xs: &mut State, ops: fn(Xint) -> bool) -> Xresult {
    let a = xs.pop_data()?;
    xs.push_data(flag(ops(a)))
}

pub fn core_word_add(xs: &mut State) -> Xresult {
    arithmetic_ops_int(xs, Xint::wrapping_add)
}

pub fn core_word_sub(xs: &mut State) -> Xresult {
    arithmetic_ops_int(xs, Xint::wrapping_sub)
}

pub fn core_word_mul(xs: &mut State) -> Xresult {
    arithmetic_ops_int(xs, Xint::wrapping_mul)
}

pub fn core_word_div(xs: &mut State) -> Xresult {
    division_ops_int(xs, Xint::wrapping_div)
}

pub fn core_word_mod(xs: &mut State) -> Xresult {
    division_ops_int(xs, Xint::wrapping_rem)
}

pub fn core_word_divmod(xs: &mut State) -> Xresult {
    let b = xs.pop_data()?;
    let a = xs.pop_data()?;
    if b == 0 {
        return Err(Xerr::DivisionByZero);
    }
    xs.push_data(a.wrapping_rem(b))?;
    xs.push_data(a.wrapping_div(b))
}

pub fn core_word_bitand(xs: &mut State) -> Xresult {
    arithmetic_ops_int(xs, std::ops::BitAnd::<Xint>::bitand)
}

pub fn core_word_bitor(xs: &mut State) -> Xresult {
    arithmetic_ops_int(xs, std::ops::BitOr::<Xint>::bitor)
}

pub fn core_word_bitxor(xs: &mut State) -> Xresult {
    arithmetic_ops_int(xs, std::ops::BitXor::<Xint>::bitxor)
}

// shift counts keep their low 6 bits
pub fn core_word_bitshl(xs: &mut State) -> Xresult {
    arithmetic_ops_int(xs, |a, b| Xint::wrapping_shl(a, b as u32))
}

pub fn core_word_bitshr(xs: &mut State) -> Xresult {
    arithmetic_ops_int(xs, |a, b| Xint::wrapping_shr(a, b as u32))
}

pub(crate) fn load(xs: &mut State) -> Xresult {
    xs.defword("neg", |xs| unary_ops_int(xs, Xint::wrapping_neg))?;
    xs.t.add = xs.defword("+", core_word_add)?;
    xs.defword("-", core_word_sub)?;
    xs.defword("shl", core_word_bitshl)?;
    xs.defword("shr", core_word_bitshr)?;
    xs.defword("*", core_word_mul)?;
    xs.defword("/", core_word_div)?;
    xs.defword("mod", core_word_mod)?;
    xs.defword("/mod", core_word_divmod)?;
    xs.defword("and", core_word_bitand)?;
    xs.defword("or", core_word_bitor)?;
    xs.defword("xor", core_word_bitxor)?;
    xs.defword("<", |xs| compare_ops(xs, Xint::lt))?;
    xs.defword(">", |xs| compare_ops(xs, Xint::gt))?;
    xs.defword("=", |xs| compare_ops(xs, Xint::eq))?;
    xs.defword("<>", |xs| compare_ops(xs, Xint::ne))?;
    xs.defword("0=", |xs| test_ops(xs, |a| a == 0))?;
    xs.defword("0<", |xs| test_ops(xs, |a| a < 0))?;
    xs.defword("0>", |xs| test_ops(xs, |a| a > 0))?;
    xs.defword("0<>", |xs| test_ops(xs, |a| a != 0))?;
    xs.defword("max", |xs| arithmetic_ops_int(xs, Xint::max))?;
    xs.defword("min", |xs| arithmetic_ops_int(xs, Xint::min))?;
    xs.defword("1+", |xs| unary_ops_int(xs, |a| a.wrapping_add(1)))?;
    xs.defword("1-", |xs| unary_ops_int(xs, |a| a.wrapping_sub(1)))?;
    xs.defword("2*", |xs| unary_ops_int(xs, |a| a.wrapping_shl(1)))?;
    xs.defword("2/", |xs| unary_ops_int(xs, |a| a >> 1))?;
    xs.defword("abs", |xs| unary_ops_int(xs, Xint::wrapping_abs))?;
    OK
}

#[test]
fn test_arith() {
    let mut xs = State::boot().unwrap();
    xs.eval("5 4 -").unwrap();
    assert_eq!(Ok(1), xs.pop_data());
    xs.eval("4 5 -").unwrap();
    assert_eq!(Ok(-1), xs.pop_data());
    xs.eval("4 5 *").unwrap();
    assert_eq!(Ok(20), xs.pop_data());
    xs.eval("20 4 /").unwrap();
    assert_eq!(Ok(5), xs.pop_data());
    xs.eval("-7 2 /").unwrap();
    assert_eq!(Ok(-3), xs.pop_data());
    xs.eval("1 1 +").unwrap();
    assert_eq!(Ok(2), xs.pop_data());
    xs.eval("7 3 mod -7 3 mod").unwrap();
    assert_eq!(Ok(-1), xs.pop_data());
    assert_eq!(Ok(1), xs.pop_data());
    xs.eval("17 5 /mod").unwrap();
    assert_eq!(Ok(3), xs.pop_data());
    assert_eq!(Ok(2), xs.pop_data());
    assert_eq!(Err(Xerr::StackUnderflow), xs.eval("1 +"));
    assert_eq!(Err(Xerr::StackUnderflow), xs.eval("+"));
    xs.eval("5 neg 5 neg abs").unwrap();
    assert_eq!(Ok(5), xs.pop_data());
    assert_eq!(Ok(-5), xs.pop_data());
    xs.eval("3 9 max 3 9 min").unwrap();
    assert_eq!(Ok(3), xs.pop_data());
    assert_eq!(Ok(9), xs.pop_data());
    xs.eval("10 1+ 10 1- 10 2* -10 2/").unwrap();
    assert_eq!(Ok(-5), xs.pop_data());
    assert_eq!(Ok(20), xs.pop_data());
    assert_eq!(Ok(9), xs.pop_data());
    assert_eq!(Ok(11), xs.pop_data());
}

#[test]
fn test_division_by_zero() {
    let mut xs = State::boot().unwrap();
    assert_eq!(Err(Xerr::DivisionByZero), xs.eval("1 0 /"));
    assert_eq!(Err(Xerr::DivisionByZero), xs.eval("1 0 mod"));
    assert_eq!(Err(Xerr::DivisionByZero), xs.eval("1 0 /mod"));
    assert_eq!(0, xs.data_depth());
    xs.eval("-9223372036854775808 -1 /").unwrap();
    assert_eq!(Ok(Xint::MIN), xs.pop_data());
}

#[test]
fn test_wrapping() {
    let mut xs = State::boot().unwrap();
    xs.eval("9223372036854775807 1+").unwrap();
    assert_eq!(Ok(Xint::MIN), xs.pop_data());
    xs.eval("-9223372036854775808 neg").unwrap();
    assert_eq!(Ok(Xint::MIN), xs.pop_data());
    xs.eval(": inc 1 + ; 9223372036854775807 inc").unwrap();
    assert_eq!(Ok(Xint::MIN), xs.pop_data());
}

#[test]
fn test_bits() {
    let mut xs = State::boot().unwrap();
    xs.eval("1 1 and").unwrap();
    assert_eq!(Ok(1), xs.pop_data());
    xs.eval("1 2 or").unwrap();
    assert_eq!(Ok(3), xs.pop_data());
    xs.eval("1 3 xor").unwrap();
    assert_eq!(Ok(2), xs.pop_data());
    xs.eval("1 3 shl").unwrap();
    assert_eq!(Ok(8), xs.pop_data());
    xs.eval("16 3 shr").unwrap();
    assert_eq!(Ok(2), xs.pop_data());
    xs.eval("-16 2 shr").unwrap();
    assert_eq!(Ok(-4), xs.pop_data());
    xs.eval("1 65 shl").unwrap();
    assert_eq!(Ok(2), xs.pop_data());
}

#[test]
fn test_compare() {
    let mut xs = State::boot().unwrap();
    xs.eval("1 2 < 2 1 < 1 2 > 2 2 = 2 3 <>").unwrap();
    assert_eq!(Ok(TRUE), xs.pop_data());
    assert_eq!(Ok(TRUE), xs.pop_data());
    assert_eq!(Ok(FALSE), xs.pop_data());
    assert_eq!(Ok(FALSE), xs.pop_data());
    assert_eq!(Ok(TRUE), xs.pop_data());
    xs.eval("0 0= 5 0= -5 0< 5 0> 0 0<>").unwrap();
    assert_eq!(Ok(FALSE), xs.pop_data());
    assert_eq!(Ok(TRUE), xs.pop_data());
    assert_eq!(Ok(TRUE), xs.pop_data());
    assert_eq!(Ok(FALSE), xs.pop_data());
    assert_eq!(Ok(TRUE), xs.pop_data());
}
