//! Two-stack infix evaluation shared by the regex and grammar compilers.

/// A binary or postfix operator.
pub(crate) trait Operator: Copy {
    /// Operators of higher precedence bind tighter.
    fn precedence(self) -> u8;
}

/// Applies operators to the operands of an [`OperatorStack`].
pub(crate) trait Evaluate<T, O> {
    type Error;

    /// Pops the operands of `op` from `stack` and pushes the result.
    fn evaluate(&mut self, stack: &mut OperatorStack<T, O>, op: O) -> Result<(), Self::Error>;

    fn unopened_group(&self) -> Self::Error;

    fn unterminated_group(&self) -> Self::Error;
}

#[derive(Clone, Copy, Debug)]
enum Entry<O> {
    Op(O),
    /// An open `(`, holding the operand stack depth at the time it was read.
    Group(usize),
}

pub(crate) struct OperatorStack<T, O> {
    operands: Vec<T>,
    operators: Vec<Entry<O>>,
}

impl<T, O: Operator> OperatorStack<T, O> {
    pub fn new() -> Self {
        Self {
            operands: vec![],
            operators: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn push_operand(&mut self, operand: T) {
        self.operands.push(operand);
    }

    pub fn open_group(&mut self) {
        self.operators.push(Entry::Group(self.operands.len()));
    }

    /// Evaluates every stacked operator binding at least as tightly as `op`,
    /// then stacks `op`.
    pub fn push_operator<C>(&mut self, ctx: &mut C, op: O) -> Result<(), C::Error>
    where
        C: Evaluate<T, O>,
    {
        while let Some(&Entry::Op(top)) = self.operators.last() {
            if top.precedence() < op.precedence() {
                break;
            }
            self.operators.pop();
            ctx.evaluate(self, top)?;
        }
        self.operators.push(Entry::Op(op));
        Ok(())
    }

    /// Evaluates up to the innermost open group and closes it, returning the
    /// operand depth recorded when the group was opened.
    pub fn close_group<C>(&mut self, ctx: &mut C) -> Result<usize, C::Error>
    where
        C: Evaluate<T, O>,
    {
        loop {
            match self.operators.pop() {
                None => return Err(ctx.unopened_group()),
                Some(Entry::Group(depth)) => return Ok(depth),
                Some(Entry::Op(op)) => ctx.evaluate(self, op)?,
            }
        }
    }

    /// Evaluates the remaining operators and returns the operands left over.
    pub fn finish<C>(mut self, ctx: &mut C) -> Result<Vec<T>, C::Error>
    where
        C: Evaluate<T, O>,
    {
        while let Some(entry) = self.operators.pop() {
            match entry {
                Entry::Op(op) => ctx.evaluate(&mut self, op)?,
                Entry::Group(_) => return Err(ctx.unterminated_group()),
            }
        }
        Ok(self.operands)
    }

    /// Pops an operand, unless only operands from outside the innermost open
    /// group are left.
    pub fn pop_operand(&mut self) -> Option<T> {
        if self.operands.len() <= self.floor() {
            return None;
        }
        self.operands.pop()
    }

    fn floor(&self) -> usize {
        self.operators
            .iter()
            .rev()
            .find_map(|entry| match entry {
                Entry::Group(depth) => Some(*depth),
                Entry::Op(_) => None,
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use crate::operator_stack::{Evaluate, Operator, OperatorStack};

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    enum Arith {
        Add,
        Mul,
        Neg,
    }

    impl Operator for Arith {
        fn precedence(self) -> u8 {
            match self {
                Arith::Neg => 3,
                Arith::Mul => 2,
                Arith::Add => 1,
            }
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Error {
        Missing(Arith),
        Unopened,
        Unterminated,
    }

    struct Calculator;

    impl Evaluate<i64, Arith> for Calculator {
        type Error = Error;

        fn evaluate(&mut self, stack: &mut OperatorStack<i64, Arith>, op: Arith) -> Result<(), Error> {
            let right = stack.pop_operand().ok_or(Error::Missing(op))?;
            let result = match op {
                Arith::Neg => -right,
                Arith::Add | Arith::Mul => {
                    let left = stack.pop_operand().ok_or(Error::Missing(op))?;
                    if op == Arith::Add { left + right } else { left * right }
                }
            };
            stack.push_operand(result);
            Ok(())
        }

        fn unopened_group(&self) -> Error {
            Error::Unopened
        }

        fn unterminated_group(&self) -> Error {
            Error::Unterminated
        }
    }

    /// Digits, `+`, `*`, postfix `~` for negation and parentheses.
    fn eval(input: &str) -> Result<Vec<i64>, Error> {
        let mut stack = OperatorStack::new();
        for ch in input.chars() {
            match ch {
                '+' => stack.push_operator(&mut Calculator, Arith::Add)?,
                '*' => stack.push_operator(&mut Calculator, Arith::Mul)?,
                '~' => stack.push_operator(&mut Calculator, Arith::Neg)?,
                '(' => stack.open_group(),
                ')' => {
                    stack.close_group(&mut Calculator)?;
                }
                digit => stack.push_operand(i64::from(digit.to_digit(10).unwrap_or(0))),
            }
        }
        stack.finish(&mut Calculator)
    }

    #[test]
    fn main() {
        assert_eq!(eval("1+2*3"), Ok(vec![7]));
        assert_eq!(eval("(1+2)*3"), Ok(vec![9]));
        assert_eq!(eval("2*3~+1"), Ok(vec![-5]));
        assert_eq!(eval("2*(3+1)~"), Ok(vec![-8]));
        assert_eq!(eval("12"), Ok(vec![1, 2]));
    }

    #[test]
    fn groups_hide_outer_operands() {
        assert_eq!(eval("1*(+2)"), Err(Error::Missing(Arith::Add)));
        assert_eq!(eval("1(~)"), Err(Error::Missing(Arith::Neg)));
        assert_eq!(eval("(1+2"), Err(Error::Unterminated));
        assert_eq!(eval("1+2)"), Err(Error::Unopened));
    }

    #[test]
    fn close_group_returns_depth() {
        let mut stack: OperatorStack<i64, Arith> = OperatorStack::new();
        stack.push_operand(1);
        stack.open_group();
        assert_eq!(stack.close_group(&mut Calculator), Ok(1));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.pop_operand(), Some(1));
        assert_eq!(stack.pop_operand(), None);
    }
}
