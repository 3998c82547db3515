// Scripted display for tests: frames are rendered from a state value and
// input events mutate that state.

use std::time::Duration;

use super::{DisplayChannel, Frame};
use crate::error::{AutomationError, AutomationResult};
use crate::match_image::{Area, Point};
use image::{Rgb, RgbImage};

type Render<S> = Box<dyn Fn(&S) -> Frame>;
type OnTap<S> = Box<dyn FnMut(&mut S, Point)>;
type OnSwipe<S> = Box<dyn FnMut(&mut S, Point, Point)>;

pub(crate) struct MockDisplay<S> {
    pub state: S,
    render: Render<S>,
    on_tap: OnTap<S>,
    on_swipe: OnSwipe<S>,
    pub taps: Vec<Point>,
    pub swipes: Vec<(Point, Point)>,
    pub captures: usize,
    pub fail_capture: bool,
}

impl<S> MockDisplay<S> {
    pub fn new(state: S, render: impl Fn(&S) -> Frame + 'static) -> Self {
        Self {
            state,
            render: Box::new(render),
            on_tap: Box::new(|_, _| {}),
            on_swipe: Box::new(|_, _, _| {}),
            taps: Vec::new(),
            swipes: Vec::new(),
            captures: 0,
            fail_capture: false,
        }
    }

    pub fn on_tap(mut self, f: impl FnMut(&mut S, Point) + 'static) -> Self {
        self.on_tap = Box::new(f);
        self
    }

    pub fn on_swipe(mut self, f: impl FnMut(&mut S, Point, Point) + 'static) -> Self {
        self.on_swipe = Box::new(f);
        self
    }

    pub fn taps_in(&self, area: Area) -> usize {
        self.taps.iter().filter(|p| area.contains(**p)).count()
    }
}

impl<S> DisplayChannel for MockDisplay<S> {
    async fn capture_frame(&mut self) -> AutomationResult<Frame> {
        if self.fail_capture {
            return Err(AutomationError::Capture {
                description: "mock capture failure".into(),
            });
        }
        self.captures += 1;
        Ok((self.render)(&self.state))
    }

    async fn tap(&mut self, point: Point) -> AutomationResult<()> {
        self.taps.push(point);
        (self.on_tap)(&mut self.state, point);
        Ok(())
    }

    async fn swipe(&mut self, from: Point, to: Point, _duration: Duration) -> AutomationResult<()> {
        self.swipes.push((from, to));
        (self.on_swipe)(&mut self.state, from, to);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub(crate) const SCREEN: (u32, u32) = (320, 240);

pub(crate) fn blank() -> RgbImage {
    RgbImage::from_pixel(SCREEN.0, SCREEN.1, Rgb([20, 20, 20]))
}

pub(crate) fn fill(frame: &mut RgbImage, area: Area, color: Rgb<u8>) {
    let area = area.clipped(frame.width(), frame.height());
    for y in area.y1..area.y2 {
        for x in area.x1..area.x2 {
            frame.put_pixel(x as u32, y as u32, color);
        }
    }
}
