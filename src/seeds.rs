//! Built-in problems so the app is useful even without OpenAI.
//!
//! `SeedBank` answers the generator calls with text in the same shape the model is
//! prompted to produce, so offline sets go through the normal extraction path.

use async_trait::async_trait;

use crate::domain::{Difficulty, ProblemStyle};
use crate::error::ChatError;
use crate::extract::{END_MARKER, START_MARKER};
use crate::source::ProblemGenerator;

/// (statement, clarification)
type Seed = (&'static str, &'static str);

const OLYMPIAD: &[Seed] = &[
  (
    "Let n be a positive integer. Prove that n^5 - n is divisible by 30 for every positive integer n, and determine whether the statement remains true when 30 is replaced by 60.",
    "Show 30 always divides n^5 - n, then check whether 60 does too.",
  ),
  (
    "Find all real numbers x such that x^2 - 5x + 6 = 0 and x^3 - 7x + 6 = 0 hold simultaneously. Justify why no other values are possible.",
    "Which numbers solve both equations at once?",
  ),
  (
    "Let ABC be a triangle with AB = AC and let D be the midpoint of BC. Prove that AD is perpendicular to BC, and compute AD when AB = 13 and BC = 10.",
    "In an isosceles triangle, show the median to the base is an altitude, then find its length.",
  ),
  (
    "Determine the number of ordered pairs of positive integers (a, b) such that a + b = 100 and gcd(a, b) = 1. Explain how Euler's totient function appears in your count.",
    "Count coprime positive pairs summing to 100.",
  ),
  (
    "Suppose that a sequence is defined by a_1 = 1 and a_(n+1) = 2a_n + 1 for all n >= 1. Find a closed form for a_n and prove it by induction.",
    "Solve the recurrence and prove the formula.",
  ),
  (
    "Given 10 points in the plane with no three collinear, determine how many triangles have all three vertices among these points, and prove that at least one of them has an angle of at least 108 degrees.",
    "Count triangles on 10 points and show one has a large angle.",
  ),
];

const QUIZ: &[Seed] = &[
  (
    "A train travels 180 kilometres in 2 hours and then 120 kilometres in 1.5 hours. What is its average speed over the whole journey, in kilometres per hour?",
    "Total distance divided by total time.",
  ),
  (
    "If the probability of rain on any given day is 0.3, independently of other days, what is the probability that it rains on exactly two of the next three days?",
    "Binomial probability with n = 3, k = 2, p = 0.3.",
  ),
  (
    "Which is larger, 2^100 or 3^63? Explain your reasoning without computing either number exactly, using logarithms or a comparison of powers.",
    "Compare two large powers.",
  ),
  (
    "A rectangle has a perimeter of 40 centimetres and an area of 96 square centimetres. What are the lengths of its sides, and how did you find them?",
    "Find the sides from perimeter and area.",
  ),
  (
    "How many distinct arrangements of the letters of the word LEVEL are there? Explain why the answer is smaller than 5 factorial.",
    "Permutations with repeated letters.",
  ),
];

const CODING: &[Seed] = &[
  (
    "Write a function that, given a list of integers, returns the length of the longest strictly increasing subsequence. Explain the algorithm and state its time complexity.",
    "Longest increasing subsequence length.",
  ),
  (
    "Implement a function that checks whether a string of brackets containing (), [] and {} is balanced. Describe which data structure your solution uses and why.",
    "Balanced brackets check.",
  ),
  (
    "Write a function that merges two sorted arrays into one sorted array in linear time without using a library sort. Explain how your approach handles duplicates.",
    "Merge two sorted arrays.",
  ),
  (
    "Design a class that implements a least-recently-used cache with get and put operations in constant time. Explain how the eviction order is maintained.",
    "LRU cache with O(1) operations.",
  ),
];

fn bank(style: ProblemStyle) -> &'static [Seed] {
  match style {
    ProblemStyle::Olympiad => OLYMPIAD,
    ProblemStyle::Quiz => QUIZ,
    ProblemStyle::Coding => CODING,
  }
}

/// Render seeds `[from, from + count)` (0-based) as a numbered, sentinel-wrapped set.
fn render(style: ProblemStyle, from: usize, count: usize) -> String {
  let mut out = format!("{START_MARKER}\n");
  for (i, (statement, clarification)) in bank(style).iter().enumerate().skip(from).take(count) {
    out.push_str(&format!("{}. {}\nClarification: {}\n\n", i + 1, statement, clarification));
  }
  out.push_str(END_MARKER);
  out
}

/// Offline generator. Ignores the query; difficulty only affects scoring.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeedBank;

#[async_trait]
impl ProblemGenerator for SeedBank {
  async fn generate(
    &self,
    _query: &str,
    count: usize,
    max_results: usize,
    style: ProblemStyle,
    _difficulty: Difficulty,
  ) -> Result<String, ChatError> {
    Ok(render(style, 0, count.min(max_results)))
  }

  async fn continue_generate(
    &self,
    _query: &str,
    start_at: usize,
    count: usize,
    _max_results: usize,
    style: ProblemStyle,
    _difficulty: Difficulty,
  ) -> Result<String, ChatError> {
    Ok(render(style, start_at.saturating_sub(1), count))
  }
}
